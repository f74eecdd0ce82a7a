use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_iam as iam;
use aws_sdk_iam::error::DisplayErrorContext;
use tracing::debug;
use trailguard_core::{CapabilityError, IdentityPolicy};

/// Attaches managed policies to IAM users.
///
/// `AttachUserPolicy` with a policy that is already attached succeeds.
#[derive(Clone)]
pub struct IamService {
    client: iam::Client,
}

impl IamService {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: iam::Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl IdentityPolicy for IamService {
    async fn attach_deny_policy(
        &self,
        identity: &str,
        policy_arn: &str,
    ) -> Result<(), CapabilityError> {
        self.client
            .attach_user_policy()
            .user_name(identity)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|err| {
                CapabilityError::service("AttachUserPolicy", DisplayErrorContext(&err).to_string())
            })?;
        debug!(identity, policy_arn, "AttachUserPolicy accepted");
        Ok(())
    }
}
