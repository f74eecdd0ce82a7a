use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by an external capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    /// The service answered with an error.
    #[error("{operation} failed: {message}")]
    Service {
        operation: &'static str,
        message: String,
    },

    /// No answer within the configured bound.
    #[error("{operation} timed out after {elapsed:?}")]
    TimedOut {
        operation: &'static str,
        elapsed: Duration,
    },
}

impl CapabilityError {
    pub fn service(operation: &'static str, message: impl Into<String>) -> Self {
        CapabilityError::Service {
            operation,
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CapabilityError::TimedOut { .. })
    }
}

/// Resumes logging on a trail.
///
/// Implementations must treat an already-logging trail as success.
#[async_trait]
pub trait TrailControl: Send + Sync {
    async fn start_logging(&self, trail: &str) -> Result<(), CapabilityError>;
}

/// Attaches a managed policy to an identity.
///
/// Implementations must treat an already-attached policy as success.
#[async_trait]
pub trait IdentityPolicy: Send + Sync {
    async fn attach_deny_policy(
        &self,
        identity: &str,
        policy_arn: &str,
    ) -> Result<(), CapabilityError>;
}

/// Publishes a notification to a target (topic, sink, ...).
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        target: &str,
        subject: &str,
        body_json: &str,
    ) -> Result<(), CapabilityError>;
}

/// Runs one external call under a timeout.
pub(crate) async fn bounded<F>(
    operation: &'static str,
    limit: Duration,
    call: F,
) -> Result<(), CapabilityError>
where
    F: Future<Output = Result<(), CapabilityError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(CapabilityError::TimedOut {
            operation,
            elapsed: limit,
        }),
    }
}
