//! Core types and decision logic for the trailguard remediation controller.
//!
//! A CloudTrail change event is normalized, classified against an action
//! table, always notified, and, when the trail was stopped, remediated by
//! restarting logging and attaching a deny-all policy to the actor.

pub mod catalog;
pub mod config;
pub mod controller;
pub mod event;
pub mod model;
pub mod notify;
pub mod remediate;
pub mod templates;
pub mod traits;

pub use catalog::{resolve_action_table, Action, ActionTable, Classifier};
pub use config::{Config, ConfigError};
pub use controller::{Capabilities, Controller, HandleReport};
pub use event::{normalize, normalize_str, ChangeEvent, MalformedEventError};
pub use notify::{NotificationRecord, Notifier, PublishError};
pub use remediate::{
    RemediationOutcome, RemediationStep, RemediationStepError, Remediator, StepFailure,
};
pub use traits::{CapabilityError, IdentityPolicy, Publisher, TrailControl};
