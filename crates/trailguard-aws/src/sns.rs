use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sns as sns;
use aws_sdk_sns::error::DisplayErrorContext;
use tracing::debug;
use trailguard_core::{CapabilityError, Publisher};

/// SNS rejects subjects longer than this.
pub const MAX_SUBJECT_LEN: usize = 100;

/// Publishes notifications to an SNS topic.
///
/// Bodies are sent with message structure `json`, so the `default` key of the
/// body is delivered to every protocol.
#[derive(Clone)]
pub struct SnsService {
    client: sns::Client,
}

impl SnsService {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: sns::Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl Publisher for SnsService {
    async fn publish(
        &self,
        target: &str,
        subject: &str,
        body_json: &str,
    ) -> Result<(), CapabilityError> {
        let response = self
            .client
            .publish()
            .target_arn(target)
            .subject(sns_subject(subject))
            .message(body_json)
            .message_structure("json")
            .send()
            .await
            .map_err(|err| CapabilityError::service("Publish", DisplayErrorContext(&err).to_string()))?;
        debug!(topic = target, message_id = ?response.message_id(), "Publish accepted");
        Ok(())
    }
}

/// Coerces a subject into what SNS accepts: printable ASCII, no line breaks,
/// at most [`MAX_SUBJECT_LEN`] characters.
pub fn sns_subject(subject: &str) -> String {
    subject
        .chars()
        .map(|ch| match ch {
            ' '..='~' => ch,
            _ => '?',
        })
        .take(MAX_SUBJECT_LEN)
        .collect()
}
