//! Single-pass event handling: normalize, classify, notify, then remediate.

use crate::catalog::{Action, Classifier};
use crate::config::Config;
use crate::event::{normalize, normalize_str, ChangeEvent, MalformedEventError};
use crate::notify::{Notifier, PublishError};
use crate::remediate::{RemediationOutcome, Remediator};
use crate::traits::{IdentityPolicy, Publisher, TrailControl};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// External capabilities wired into a controller.
#[derive(Clone)]
pub struct Capabilities {
    pub trail: Arc<dyn TrailControl>,
    pub identity: Arc<dyn IdentityPolicy>,
    pub publisher: Arc<dyn Publisher>,
}

/// What happened to one handled event.
#[derive(Debug, Clone, PartialEq)]
pub struct HandleReport {
    pub event: ChangeEvent,
    pub action: Action,
    pub notification: Result<(), PublishError>,
    /// `Some` only when the action remediates.
    pub remediation: Option<RemediationOutcome>,
}

impl HandleReport {
    pub fn notified(&self) -> bool {
        self.notification.is_ok()
    }
}

/// Stateless orchestrator; share one instance across concurrent invocations.
#[derive(Clone)]
pub struct Controller {
    classifier: Classifier,
    notifier: Notifier,
    remediator: Remediator,
}

impl Controller {
    pub fn new(config: &Config, capabilities: Capabilities) -> Self {
        let timeout = config.timeouts.call_timeout();
        Self {
            classifier: Classifier::from_config(&config.classification),
            notifier: Notifier::new(
                capabilities.publisher,
                config.notification.target_arn.clone(),
                timeout,
            ),
            remediator: Remediator::new(
                capabilities.trail,
                capabilities.identity,
                config.lockdown.deny_policy_arn.clone(),
                timeout,
            ),
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Handles raw envelope text.
    pub async fn handle_str(&self, raw: &str) -> Result<HandleReport, MalformedEventError> {
        match normalize_str(raw) {
            Ok(event) => Ok(self.dispatch(event).await),
            Err(err) => Err(dropped(err)),
        }
    }

    /// Handles a decoded envelope.
    ///
    /// Only malformed input is an error; every downstream failure is logged
    /// and reported in the [`HandleReport`].
    pub async fn handle(&self, raw: &Value) -> Result<HandleReport, MalformedEventError> {
        match normalize(raw) {
            Ok(event) => Ok(self.dispatch(event).await),
            Err(err) => Err(dropped(err)),
        }
    }

    async fn dispatch(&self, event: ChangeEvent) -> HandleReport {
        debug!(event = %event.raw_payload(), "received event");
        let action = self.classifier.classify(&event);
        info!(
            event_name = event.event_name(),
            event_source = event.event_source(),
            identity = event.identity_label(),
            resource = event.resource_label(),
            action = %action,
            "event classified"
        );

        let notification = self.notifier.notify(&event, action).await;

        let remediation = if action.remediates() {
            let outcome = self.remediator.remediate(&event).await;
            log_outcome(&event, &outcome);
            Some(outcome)
        } else {
            None
        };

        HandleReport {
            event,
            action,
            notification,
            remediation,
        }
    }
}

fn dropped(err: MalformedEventError) -> MalformedEventError {
    error!(error = %err, "dropping malformed event");
    err
}

fn log_outcome(event: &ChangeEvent, outcome: &RemediationOutcome) {
    if outcome.is_complete() {
        info!(
            event_name = event.event_name(),
            identity = event.identity_label(),
            resource = event.resource_label(),
            "remediation complete"
        );
        return;
    }

    let failures = outcome
        .errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    warn!(
        event_name = event.event_name(),
        identity = event.identity_label(),
        resource = event.resource_label(),
        reactivation_succeeded = outcome.reactivation_succeeded,
        lockdown_succeeded = outcome.lockdown_succeeded,
        failures = %failures,
        "remediation incomplete"
    );
}
