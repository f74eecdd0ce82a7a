//! In-memory capabilities that record every call.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use trailguard_core::{
    Capabilities, CapabilityError, Config, Controller, IdentityPolicy, Publisher, TrailControl,
};

pub const TOPIC_ARN: &str = "arn:aws:sns:eu-central-1:123456789012:trail-alerts";
pub const DENY_ALL: &str = "arn:aws:iam::aws:policy/AWSDenyAll";
pub const TRAIL_ARN: &str = "arn:aws:cloudtrail:eu-central-1:123456789012:trail/my-trail";

/// Operation names in call order, shared by every fake in a [`Harness`].
pub type Journal = Arc<Mutex<Vec<&'static str>>>;

/// Trail control that tracks which trails are logging.
#[derive(Default)]
pub struct FakeTrail {
    pub calls: Mutex<Vec<String>>,
    logging: Mutex<HashSet<String>>,
    failure: Option<CapabilityError>,
    delay: Option<Duration>,
    journal: Journal,
}

impl FakeTrail {
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(CapabilityError::service("StartLogging", message)),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn is_logging(&self, trail: &str) -> bool {
        self.logging.lock().unwrap().contains(trail)
    }
}

#[async_trait]
impl TrailControl for FakeTrail {
    async fn start_logging(&self, trail: &str) -> Result<(), CapabilityError> {
        self.journal.lock().unwrap().push("StartLogging");
        self.calls.lock().unwrap().push(trail.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        // Already logging is a no-op, like the real service.
        self.logging.lock().unwrap().insert(trail.to_string());
        Ok(())
    }
}

/// Identity policy store keyed by (identity, policy).
#[derive(Default)]
pub struct FakeIdentity {
    pub calls: Mutex<Vec<(String, String)>>,
    attached: Mutex<HashSet<(String, String)>>,
    failure: Option<CapabilityError>,
    journal: Journal,
}

impl FakeIdentity {
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(CapabilityError::service("AttachUserPolicy", message)),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn attached_count(&self) -> usize {
        self.attached.lock().unwrap().len()
    }
}

#[async_trait]
impl IdentityPolicy for FakeIdentity {
    async fn attach_deny_policy(
        &self,
        identity: &str,
        policy_arn: &str,
    ) -> Result<(), CapabilityError> {
        self.journal.lock().unwrap().push("AttachUserPolicy");
        self.calls
            .lock()
            .unwrap()
            .push((identity.to_string(), policy_arn.to_string()));
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        self.attached
            .lock()
            .unwrap()
            .insert((identity.to_string(), policy_arn.to_string()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub target: String,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct FakePublisher {
    pub published: Mutex<Vec<Published>>,
    failure: Option<CapabilityError>,
    journal: Journal,
}

impl FakePublisher {
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(CapabilityError::service("Publish", message)),
            ..Self::default()
        }
    }

    pub fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn publish(
        &self,
        target: &str,
        subject: &str,
        body_json: &str,
    ) -> Result<(), CapabilityError> {
        self.journal.lock().unwrap().push("Publish");
        self.published.lock().unwrap().push(Published {
            target: target.to_string(),
            subject: subject.to_string(),
            body: body_json.to_string(),
        });
        match &self.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }
}

pub struct Harness {
    pub trail: Arc<FakeTrail>,
    pub identity: Arc<FakeIdentity>,
    pub publisher: Arc<FakePublisher>,
    pub controller: Controller,
    journal: Journal,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(FakeTrail::default(), FakeIdentity::default(), FakePublisher::default())
    }

    pub fn with(trail: FakeTrail, identity: FakeIdentity, publisher: FakePublisher) -> Self {
        Self::with_config(&Config::with_target(TOPIC_ARN), trail, identity, publisher)
    }

    pub fn with_config(
        config: &Config,
        mut trail: FakeTrail,
        mut identity: FakeIdentity,
        mut publisher: FakePublisher,
    ) -> Self {
        let journal = Journal::default();
        trail.journal = journal.clone();
        identity.journal = journal.clone();
        publisher.journal = journal.clone();

        let trail = Arc::new(trail);
        let identity = Arc::new(identity);
        let publisher = Arc::new(publisher);
        let controller = Controller::new(
            config,
            Capabilities {
                trail: trail.clone(),
                identity: identity.clone(),
                publisher: publisher.clone(),
            },
        );
        Self {
            trail,
            identity,
            publisher,
            controller,
            journal,
        }
    }

    /// Every external call made through this harness, in order.
    pub fn journal(&self) -> Vec<&'static str> {
        self.journal.lock().unwrap().clone()
    }

    pub fn external_calls(&self) -> usize {
        self.trail.calls().len() + self.identity.calls().len() + self.publisher.published().len()
    }
}

pub fn envelope(event_name: &str) -> Value {
    json!({
        "version": "0",
        "detail-type": "AWS API Call via CloudTrail",
        "source": "aws.cloudtrail",
        "detail": {
            "eventName": event_name,
            "eventSource": "cloudtrail.amazonaws.com",
            "requestParameters": { "name": TRAIL_ARN },
            "userIdentity": { "type": "IAMUser", "userName": "alice" }
        }
    })
}
