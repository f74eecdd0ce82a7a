//! Normalized change events decoded from EventBridge "AWS API Call via CloudTrail"
//! envelopes.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// The trigger payload could not be turned into a [`ChangeEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEventError {
    /// Raw text was not valid JSON.
    #[error("envelope is not valid json: {0}")]
    InvalidJson(String),

    /// The envelope or a nested section was not a JSON object.
    #[error("{0} is not a json object")]
    NotAnObject(&'static str),

    /// A required field was absent.
    #[error("missing required field {0}")]
    MissingField(&'static str),

    /// A required field was present with the wrong type.
    #[error("field {field} must be a string, got {found}")]
    NotAString { field: &'static str, found: &'static str },
}

impl From<serde_json::Error> for MalformedEventError {
    fn from(err: serde_json::Error) -> Self {
        MalformedEventError::InvalidJson(err.to_string())
    }
}

/// Typed view of one control-plane change against the trail.
///
/// `source_identity_name` and `affected_resource_id` are `None` when the
/// envelope does not carry them (or carries an empty string); remediation
/// degrades per step instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    event_name: String,
    event_source: String,
    source_identity_name: Option<String>,
    affected_resource_id: Option<String>,
    raw_payload: Value,
}

impl ChangeEvent {
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn event_source(&self) -> &str {
        &self.event_source
    }

    pub fn source_identity_name(&self) -> Option<&str> {
        self.source_identity_name.as_deref()
    }

    pub fn affected_resource_id(&self) -> Option<&str> {
        self.affected_resource_id.as_deref()
    }

    /// The full envelope as received, kept for operator forensics.
    pub fn raw_payload(&self) -> &Value {
        &self.raw_payload
    }

    /// Identity name for logs and subjects, `unknown` when absent.
    pub fn identity_label(&self) -> &str {
        self.source_identity_name().unwrap_or(UNKNOWN)
    }

    /// Resource identifier for logs, `unknown` when absent.
    pub fn resource_label(&self) -> &str {
        self.affected_resource_id().unwrap_or(UNKNOWN)
    }
}

const UNKNOWN: &str = "unknown";

/// Parses raw envelope text and normalizes it.
pub fn normalize_str(raw: &str) -> Result<ChangeEvent, MalformedEventError> {
    let value: Value = serde_json::from_str(raw)?;
    normalize(&value)
}

/// Normalizes a decoded envelope.
///
/// Only `detail.eventName` and `detail.eventSource` are required. Optional
/// extractions never fail normalization, whatever their shape.
pub fn normalize(raw: &Value) -> Result<ChangeEvent, MalformedEventError> {
    let envelope = raw
        .as_object()
        .ok_or(MalformedEventError::NotAnObject("envelope"))?;
    let detail = match envelope.get("detail") {
        Some(Value::Object(detail)) => detail,
        Some(_) => return Err(MalformedEventError::NotAnObject("detail")),
        None => return Err(MalformedEventError::MissingField("detail")),
    };

    let event_name = required_string(detail.get("eventName"), "detail.eventName")?;
    let event_source = required_string(detail.get("eventSource"), "detail.eventSource")?;
    let affected_resource_id = optional_string(detail.get("requestParameters"), "name");
    let source_identity_name = optional_string(detail.get("userIdentity"), "userName");

    Ok(ChangeEvent {
        event_name,
        event_source,
        source_identity_name,
        affected_resource_id,
        raw_payload: raw.clone(),
    })
}

fn required_string(
    value: Option<&Value>,
    field: &'static str,
) -> Result<String, MalformedEventError> {
    match value {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(other) => Err(MalformedEventError::NotAString {
            field,
            found: json_type_name(other),
        }),
        None => Err(MalformedEventError::MissingField(field)),
    }
}

fn optional_string(section: Option<&Value>, key: &str) -> Option<String> {
    section
        .and_then(|section| section.get(key))
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
