//! JSON-lines sink for trailguard notifications.
//!
//! Each published notification is appended as one line to a file per UTC day.
//! With gzip enabled every line is written as its own gzip member, which
//! standard tools read back as one stream.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use trailguard_core::{CapabilityError, Publisher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonlCompression {
    None,
    Gzip,
}

/// Appends notifications to `notifications-YYYYMMDD.jsonl[.gz]` under a directory.
#[derive(Debug, Clone)]
pub struct JsonlPublisher {
    dir: PathBuf,
    compression: JsonlCompression,
}

impl JsonlPublisher {
    /// Creates the output directory if needed.
    pub fn new(dir: impl Into<PathBuf>, compression: Option<&str>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let compression = parse_compression(compression)?;
        Ok(Self { dir, compression })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that receives records published at `at`.
    pub fn path_for(&self, at: DateTime<Utc>) -> PathBuf {
        let extension = match self.compression {
            JsonlCompression::None => "jsonl",
            JsonlCompression::Gzip => "jsonl.gz",
        };
        self.dir
            .join(format!("notifications-{}.{extension}", at.format("%Y%m%d")))
    }
}

#[async_trait]
impl Publisher for JsonlPublisher {
    async fn publish(
        &self,
        target: &str,
        subject: &str,
        body_json: &str,
    ) -> Result<(), CapabilityError> {
        let now = Utc::now();
        let bytes = record_bytes(now, target, subject, body_json, self.compression)
            .map_err(|err| CapabilityError::service("Publish", err.to_string()))?;
        let path = self.path_for(now);

        let written = path.clone();
        tokio::task::spawn_blocking(move || append(&path, &bytes))
            .await
            .map_err(|err| CapabilityError::service("Publish", err.to_string()))?
            .map_err(|err| CapabilityError::service("Publish", err.to_string()))?;

        debug!(path = %written.display(), "notification appended");
        Ok(())
    }
}

fn parse_compression(value: Option<&str>) -> io::Result<JsonlCompression> {
    match value.map(|value| value.trim().to_ascii_lowercase()) {
        None => Ok(JsonlCompression::None),
        Some(value) if value.is_empty() || value == "none" => Ok(JsonlCompression::None),
        Some(value) if value == "gzip" || value == "gz" => Ok(JsonlCompression::Gzip),
        Some(value) => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsupported jsonl compression: {value}"),
        )),
    }
}

fn record_bytes(
    at: DateTime<Utc>,
    target: &str,
    subject: &str,
    body_json: &str,
    compression: JsonlCompression,
) -> io::Result<Vec<u8>> {
    // Keep the body structured when it is JSON so the file stays queryable.
    let body = serde_json::from_str::<Value>(body_json)
        .unwrap_or_else(|_| Value::String(body_json.to_string()));
    let record = json!({
        "published_at": at.to_rfc3339_opts(SecondsFormat::Millis, true),
        "target": target,
        "subject": subject,
        "body": body,
    });

    let mut line = serde_json::to_vec(&record).map_err(io::Error::other)?;
    line.push(b'\n');

    match compression {
        JsonlCompression::None => Ok(line),
        JsonlCompression::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&line)?;
            encoder.finish()
        }
    }
}

fn append(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(bytes)?;
    file.flush()
}
