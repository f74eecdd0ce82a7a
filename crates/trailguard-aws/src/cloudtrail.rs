use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudtrail as cloudtrail;
use aws_sdk_cloudtrail::error::DisplayErrorContext;
use tracing::debug;
use trailguard_core::{CapabilityError, TrailControl};

/// Restarts trail logging through the CloudTrail API.
///
/// `StartLogging` on a trail that is already logging succeeds, so redelivered
/// events are harmless.
#[derive(Clone)]
pub struct CloudTrailService {
    client: cloudtrail::Client,
}

impl CloudTrailService {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: cloudtrail::Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl TrailControl for CloudTrailService {
    async fn start_logging(&self, trail: &str) -> Result<(), CapabilityError> {
        self.client
            .start_logging()
            .name(trail)
            .send()
            .await
            .map_err(|err| {
                CapabilityError::service("StartLogging", DisplayErrorContext(&err).to_string())
            })?;
        debug!(trail, "StartLogging accepted");
        Ok(())
    }
}
