//! AWS SDK adapters for the trailguard capabilities.
//!
//! Each service wrapper implements one capability trait over a shared
//! [`aws_config::SdkConfig`]. Calls are plain SDK requests; timeouts are
//! applied by the controller.

pub mod cloudtrail;
pub mod iam;
pub mod sns;

pub use cloudtrail::CloudTrailService;
pub use iam::IamService;
pub use sns::SnsService;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use std::sync::Arc;
use trailguard_core::config::AwsConfig;
use trailguard_core::Capabilities;

/// Loads SDK configuration from the default provider chain.
pub async fn load_sdk_config(config: &AwsConfig) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }
    loader.load().await
}

/// Builds the full capability set backed by CloudTrail, IAM and SNS.
pub fn capabilities(sdk_config: &SdkConfig) -> Capabilities {
    Capabilities {
        trail: Arc::new(CloudTrailService::new(sdk_config)),
        identity: Arc::new(IamService::new(sdk_config)),
        publisher: Arc::new(SnsService::new(sdk_config)),
    }
}
