//! Trail reactivation and identity lockdown for `NotifyAndRemediate` events.
//!
//! Both steps are always attempted. A failed or skipped step is recorded in
//! the [`RemediationOutcome`] and never stops its sibling.

use crate::event::ChangeEvent;
use crate::traits::{bounded, CapabilityError, IdentityPolicy, TrailControl};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Remediation sub-step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationStep {
    Reactivate,
    Lockdown,
}

impl fmt::Display for RemediationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemediationStep::Reactivate => write!(f, "reactivate"),
            RemediationStep::Lockdown => write!(f, "lockdown"),
        }
    }
}

/// Why a sub-step did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepFailure {
    /// The event did not name the trail.
    #[error("event carries no trail identifier")]
    MissingResourceIdentifier,
    /// The event did not name the acting identity.
    #[error("event carries no identity name")]
    MissingIdentityIdentifier,
    /// The external call failed or timed out.
    #[error(transparent)]
    Call(#[from] CapabilityError),
}

impl StepFailure {
    /// Skips caused by missing event data rather than a failed call.
    pub fn is_skip(&self) -> bool {
        !matches!(self, StepFailure::Call(_))
    }
}

/// One recorded sub-step failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{step}: {cause}")]
pub struct RemediationStepError {
    pub step: RemediationStep,
    pub cause: StepFailure,
}

/// Result of one remediation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemediationOutcome {
    pub reactivation_attempted: bool,
    pub reactivation_succeeded: bool,
    pub lockdown_attempted: bool,
    pub lockdown_succeeded: bool,
    /// Failures in step order.
    pub errors: Vec<RemediationStepError>,
}

impl RemediationOutcome {
    pub fn is_complete(&self) -> bool {
        self.reactivation_succeeded && self.lockdown_succeeded
    }

    pub fn error_for(&self, step: RemediationStep) -> Option<&StepFailure> {
        self.errors
            .iter()
            .find(|error| error.step == step)
            .map(|error| &error.cause)
    }

    fn record(&mut self, step: RemediationStep, cause: StepFailure) {
        self.errors.push(RemediationStepError { step, cause });
    }
}

/// Executes reactivation and lockdown against the external capabilities.
#[derive(Clone)]
pub struct Remediator {
    trail: Arc<dyn TrailControl>,
    identity: Arc<dyn IdentityPolicy>,
    deny_policy_arn: String,
    timeout: Duration,
}

impl Remediator {
    pub fn new(
        trail: Arc<dyn TrailControl>,
        identity: Arc<dyn IdentityPolicy>,
        deny_policy_arn: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            trail,
            identity,
            deny_policy_arn: deny_policy_arn.into(),
            timeout,
        }
    }

    pub async fn remediate(&self, event: &ChangeEvent) -> RemediationOutcome {
        let mut outcome = RemediationOutcome::default();
        self.reactivate(event, &mut outcome).await;
        self.lockdown(event, &mut outcome).await;
        outcome
    }

    async fn reactivate(&self, event: &ChangeEvent, outcome: &mut RemediationOutcome) {
        let Some(trail) = event.affected_resource_id() else {
            warn!(
                event_name = event.event_name(),
                identity = event.identity_label(),
                "skipping trail reactivation: no trail identifier in event"
            );
            outcome.record(
                RemediationStep::Reactivate,
                StepFailure::MissingResourceIdentifier,
            );
            return;
        };

        outcome.reactivation_attempted = true;
        match bounded("StartLogging", self.timeout, self.trail.start_logging(trail)).await {
            Ok(()) => {
                outcome.reactivation_succeeded = true;
                info!(
                    event_name = event.event_name(),
                    resource = trail,
                    "trail logging reactivated"
                );
            }
            Err(err) => {
                error!(
                    event_name = event.event_name(),
                    identity = event.identity_label(),
                    resource = trail,
                    error = %err,
                    "trail reactivation failed"
                );
                outcome.record(RemediationStep::Reactivate, err.into());
            }
        }
    }

    async fn lockdown(&self, event: &ChangeEvent, outcome: &mut RemediationOutcome) {
        let Some(identity) = event.source_identity_name() else {
            warn!(
                event_name = event.event_name(),
                resource = event.resource_label(),
                "skipping identity lockdown: no identity name in event"
            );
            outcome.record(
                RemediationStep::Lockdown,
                StepFailure::MissingIdentityIdentifier,
            );
            return;
        };

        outcome.lockdown_attempted = true;
        let call = self
            .identity
            .attach_deny_policy(identity, &self.deny_policy_arn);
        match bounded("AttachUserPolicy", self.timeout, call).await {
            Ok(()) => {
                outcome.lockdown_succeeded = true;
                info!(
                    event_name = event.event_name(),
                    identity,
                    policy_arn = %self.deny_policy_arn,
                    "deny policy attached"
                );
            }
            Err(err) => {
                error!(
                    event_name = event.event_name(),
                    identity,
                    resource = event.resource_label(),
                    policy_arn = %self.deny_policy_arn,
                    error = %err,
                    "identity lockdown failed"
                );
                outcome.record(RemediationStep::Lockdown, err.into());
            }
        }
    }
}
