//! Capabilities that log instead of calling AWS.

use async_trait::async_trait;
use tracing::info;
use trailguard_core::{CapabilityError, IdentityPolicy, TrailControl};

pub struct LogOnlyTrail;

#[async_trait]
impl TrailControl for LogOnlyTrail {
    async fn start_logging(&self, trail: &str) -> Result<(), CapabilityError> {
        info!(trail, "dry run: would call StartLogging");
        Ok(())
    }
}

pub struct LogOnlyIdentity;

#[async_trait]
impl IdentityPolicy for LogOnlyIdentity {
    async fn attach_deny_policy(
        &self,
        identity: &str,
        policy_arn: &str,
    ) -> Result<(), CapabilityError> {
        info!(identity, policy_arn, "dry run: would call AttachUserPolicy");
        Ok(())
    }
}
