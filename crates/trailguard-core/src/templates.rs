//! Synthetic CloudTrail trail-management events for exercising a deployment.

use crate::config::CLOUDTRAIL_EVENT_SOURCE;
use crate::model::{CloudTrailDetail, EventBridgeEnvelope, UserIdentity, DETAIL_TYPE};
use chrono::{DateTime, SecondsFormat, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct ActorContext {
    pub identity_type: String,
    pub principal_id: String,
    pub arn: String,
    pub account_id: String,
    pub access_key_id: Option<String>,
    pub user_name: Option<String>,
    pub user_agent: String,
    pub source_ip: String,
    pub region: String,
}

impl ActorContext {
    /// An IAM user calling through the AWS CLI.
    pub fn iam_user(account_id: &str, user_name: &str, region: &str, rng: &mut impl Rng) -> Self {
        Self {
            identity_type: "IAMUser".to_string(),
            principal_id: format!("AIDA{}", random_alpha(rng, 17).to_uppercase()),
            arn: format!("arn:aws:iam::{account_id}:user/{user_name}"),
            account_id: account_id.to_string(),
            access_key_id: Some(format!("AKIA{}", random_alpha(rng, 16).to_uppercase())),
            user_name: Some(user_name.to_string()),
            user_agent: "aws-cli/2.15.0 Python/3.11.6 Linux/6.1 exe/x86_64".to_string(),
            source_ip: format!("203.0.113.{}", rng.gen_range(1..255)),
            region: region.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("event name must not be empty")]
    EmptyEventName,
}

/// Builds an EventBridge envelope for a CloudTrail management call on `trail`.
pub fn build_trail_event(
    event_name: &str,
    trail: &str,
    actor: &ActorContext,
    rng: &mut impl Rng,
    event_time: DateTime<Utc>,
) -> Result<EventBridgeEnvelope, TemplateError> {
    if event_name.trim().is_empty() {
        return Err(TemplateError::EmptyEventName);
    }

    let time = event_time.to_rfc3339_opts(SecondsFormat::Secs, true);
    let (request_parameters, response_elements) = parameters_for(event_name, trail, rng);

    let detail = CloudTrailDetail {
        event_version: "1.08".to_string(),
        user_identity: UserIdentity {
            identity_type: actor.identity_type.clone(),
            principal_id: actor.principal_id.clone(),
            arn: actor.arn.clone(),
            account_id: actor.account_id.clone(),
            access_key_id: actor.access_key_id.clone(),
            user_name: actor.user_name.clone(),
        },
        event_time: time.clone(),
        event_source: CLOUDTRAIL_EVENT_SOURCE.to_string(),
        event_name: event_name.to_string(),
        aws_region: actor.region.clone(),
        source_ip_address: actor.source_ip.clone(),
        user_agent: actor.user_agent.clone(),
        request_parameters,
        response_elements,
        request_id: random_uuid(rng),
        event_id: random_uuid(rng),
        read_only: Some(false),
        event_type: "AwsApiCall".to_string(),
        management_event: true,
        recipient_account_id: actor.account_id.clone(),
        event_category: "Management".to_string(),
    };

    Ok(EventBridgeEnvelope {
        version: "0".to_string(),
        id: random_uuid(rng),
        detail_type: DETAIL_TYPE.to_string(),
        source: "aws.cloudtrail".to_string(),
        account: actor.account_id.clone(),
        time,
        region: actor.region.clone(),
        resources: Vec::new(),
        detail,
    })
}

fn parameters_for(event_name: &str, trail: &str, rng: &mut impl Rng) -> (Option<Value>, Option<Value>) {
    match event_name {
        "StopLogging" | "StartLogging" | "DeleteTrail" => (Some(json!({ "name": trail })), None),
        "CreateTrail" => (
            Some(json!({
                "name": trail,
                "s3BucketName": format!("trail-logs-{}", random_alpha(rng, 8).to_lowercase()),
                "isMultiRegionTrail": true,
                "includeGlobalServiceEvents": true,
                "enableLogFileValidation": true,
            })),
            Some(json!({ "name": trail, "trailARN": trail_arn(trail), "isMultiRegionTrail": true })),
        ),
        "UpdateTrail" => (
            Some(json!({ "name": trail, "includeGlobalServiceEvents": false })),
            Some(json!({ "name": trail, "trailARN": trail_arn(trail) })),
        ),
        "AddTags" | "RemoveTags" => (
            Some(json!({
                "resourceId": trail,
                "tagsList": [{ "key": "owner", "value": "security" }],
            })),
            None,
        ),
        "PutEventSelectors" => (
            Some(json!({
                "trailName": trail,
                "eventSelectors": [{ "readWriteType": "WriteOnly", "includeManagementEvents": true }],
            })),
            Some(json!({ "trailARN": trail_arn(trail) })),
        ),
        _ => (Some(Value::Object(Default::default())), None),
    }
}

fn trail_arn(trail: &str) -> String {
    if trail.starts_with("arn:") {
        trail.to_string()
    } else {
        format!("arn:aws:cloudtrail:us-east-1:123456789012:trail/{trail}")
    }
}

fn random_alpha(rng: &mut impl Rng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn random_uuid(rng: &mut impl Rng) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(36);
    let sections = [8, 4, 4, 4, 12];
    for (idx, count) in sections.iter().enumerate() {
        if idx > 0 {
            out.push('-');
        }
        for _ in 0..*count {
            out.push(HEX[rng.gen_range(0..16)] as char);
        }
    }
    out
}
