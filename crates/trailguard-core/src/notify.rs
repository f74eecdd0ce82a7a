//! Notification records and their dispatch through a [`Publisher`].

use crate::catalog::Action;
use crate::event::ChangeEvent;
use crate::traits::{bounded, CapabilityError, Publisher};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

/// Notification dispatch failed. Never fatal to an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("failed to encode notification body: {0}")]
    Encode(String),
    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

/// Alert handed to the publish capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    pub subject: String,
    /// JSON envelope `{"default": "<original event json>"}`.
    pub body: String,
}

impl NotificationRecord {
    pub fn build(event: &ChangeEvent, action: Action) -> Result<Self, PublishError> {
        let subject = match action {
            Action::NotifyAndRemediate => format!(
                "CloudTrail event {} invoked by user {}. Blocking user and initiating reactivation...",
                event.event_name(),
                event.identity_label()
            ),
            Action::NotifyOnly => format!("CloudTrail event {} received.", event.event_name()),
        };

        let payload = serde_json::to_string(event.raw_payload())
            .map_err(|err| PublishError::Encode(err.to_string()))?;
        let body = serde_json::to_string(&json!({ "default": payload }))
            .map_err(|err| PublishError::Encode(err.to_string()))?;

        Ok(Self { subject, body })
    }
}

/// Publishes one record per classified event.
#[derive(Clone)]
pub struct Notifier {
    publisher: Arc<dyn Publisher>,
    target: String,
    timeout: Duration,
}

impl Notifier {
    pub fn new(publisher: Arc<dyn Publisher>, target: impl Into<String>, timeout: Duration) -> Self {
        Self {
            publisher,
            target: target.into(),
            timeout,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub async fn notify(&self, event: &ChangeEvent, action: Action) -> Result<(), PublishError> {
        let result = self.dispatch(event, action).await;
        match &result {
            Ok(()) => info!(
                event_name = event.event_name(),
                action = %action,
                topic = %self.target,
                "notification published"
            ),
            Err(err) => error!(
                event_name = event.event_name(),
                identity = event.identity_label(),
                resource = event.resource_label(),
                action = %action,
                topic = %self.target,
                error = %err,
                "notification publish failed"
            ),
        }
        result
    }

    async fn dispatch(&self, event: &ChangeEvent, action: Action) -> Result<(), PublishError> {
        let record = NotificationRecord::build(event, action)?;
        debug!(subject = %record.subject, "publishing notification");
        bounded(
            "Publish",
            self.timeout,
            self.publisher
                .publish(&self.target, &record.subject, &record.body),
        )
        .await?;
        Ok(())
    }
}
