use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use trailguard_core::config::{Config, CLOUDTRAIL_EVENT_SOURCE};
use trailguard_core::templates::{build_trail_event, ActorContext};
use trailguard_core::{normalize, Capabilities, Classifier, Controller, HandleReport};
use trailguard_formats_jsonl::JsonlPublisher;

mod dry_run;
mod logging;

#[derive(Debug, Parser)]
#[command(name = "trailguard")]
#[command(about = "CloudTrail stop-logging remediation controller", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Handle one envelope, a JSON array of envelopes, or a stream of envelopes.
    Handle {
        #[arg(short, long)]
        config: PathBuf,
        /// Input file; stdin when omitted or `-`.
        #[arg(short, long)]
        event: Option<PathBuf>,
        /// Overrides `notification.target_arn`.
        #[arg(long, env = "SNS_ARN")]
        topic_arn: Option<String>,
        /// Log remediation calls and write notifications to `--out-dir`.
        #[arg(long)]
        dry_run: bool,
        #[arg(long, default_value = "trailguard-out")]
        out_dir: PathBuf,
        #[arg(long)]
        compression: Option<String>,
    },
    /// Print the action configured for an event name.
    Classify {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        event_name: String,
        #[arg(long, default_value = CLOUDTRAIL_EVENT_SOURCE)]
        event_source: String,
    },
    /// Print a synthetic EventBridge envelope.
    Sample {
        #[arg(long)]
        event_name: String,
        #[arg(long, default_value = "main-trail")]
        trail: String,
        #[arg(long, default_value = "alice")]
        user: String,
        #[arg(long, default_value = "123456789012")]
        account: String,
        #[arg(long, default_value = "us-east-1")]
        region: String,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Load, validate and print a config file.
    CheckConfig {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Handle {
            config,
            event,
            topic_arn,
            dry_run,
            out_dir,
            compression,
        } => {
            let mut loaded = load_config(&config)?;
            if let Some(topic_arn) = topic_arn {
                loaded.notification.target_arn = topic_arn;
                loaded.validate()?;
            }
            logging::init(&loaded.logging);

            let capabilities = if dry_run {
                let publisher = JsonlPublisher::new(&out_dir, compression.as_deref())
                    .with_context(|| format!("failed to open {}", out_dir.display()))?;
                info!(out_dir = %out_dir.display(), "dry run: remediation calls are logged only");
                Capabilities {
                    trail: Arc::new(dry_run::LogOnlyTrail),
                    identity: Arc::new(dry_run::LogOnlyIdentity),
                    publisher: Arc::new(publisher),
                }
            } else {
                let sdk_config = trailguard_aws::load_sdk_config(&loaded.aws).await;
                trailguard_aws::capabilities(&sdk_config)
            };

            let controller = Controller::new(&loaded, capabilities);
            let content = read_input(event.as_deref())?;

            let mut malformed = 0_usize;
            for envelope in split_envelopes(&content) {
                let result = match &envelope {
                    Envelope::Decoded(value) => controller.handle(value).await,
                    Envelope::Raw(text) => controller.handle_str(text).await,
                };
                match result {
                    Ok(report) => println!("{}", report_json(&report)),
                    Err(_) => malformed += 1,
                }
            }

            if malformed > 0 {
                bail!("{malformed} malformed event(s) dropped");
            }
        }
        Commands::Classify {
            config,
            event_name,
            event_source,
        } => {
            let loaded = load_config(&config)?;
            let classifier = Classifier::from_config(&loaded.classification);
            let event = normalize(&json!({
                "detail": { "eventName": event_name, "eventSource": event_source }
            }))?;
            let recognized = classifier.table().is_recognized(event.event_name());
            println!(
                "{} -> {}{}",
                event.event_name(),
                classifier.classify(&event),
                if recognized { "" } else { " (default)" }
            );
        }
        Commands::Sample {
            event_name,
            trail,
            user,
            account,
            region,
            seed,
        } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let actor = ActorContext::iam_user(&account, &user, &region, &mut rng);
            let envelope =
                build_trail_event(&event_name, &trail, &actor, &mut rng, Utc::now())?;
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
        Commands::CheckConfig { config } => {
            let loaded = load_config(&config)?;
            println!("config loaded: {loaded:#?}");
            let classifier = Classifier::from_config(&loaded.classification);
            for (name, action) in classifier.table().iter() {
                println!("{name} -> {action}");
            }
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<Config> {
    Config::from_path(path).with_context(|| format!("failed to load config {}", path.display()))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("failed to read stdin")?;
            Ok(content)
        }
    }
}

#[derive(Debug, PartialEq)]
enum Envelope {
    Decoded(Value),
    Raw(String),
}

/// Splits input into envelopes: a stream of whitespace-separated JSON
/// documents (a single envelope, JSON lines, or pretty-printed documents back
/// to back), where a top-level array contributes each of its elements.
///
/// Text from the first syntax error onward is kept as one raw envelope, so a
/// broken document counts as a single malformed event.
fn split_envelopes(content: &str) -> Vec<Envelope> {
    let trimmed = content.trim();
    let mut envelopes = Vec::new();
    let mut stream = serde_json::Deserializer::from_str(trimmed).into_iter::<Value>();

    loop {
        let start = stream.byte_offset();
        match stream.next() {
            None => break,
            Some(Ok(Value::Array(items))) => {
                envelopes.extend(items.into_iter().map(Envelope::Decoded));
            }
            Some(Ok(value)) => envelopes.push(Envelope::Decoded(value)),
            Some(Err(_)) => {
                envelopes.push(Envelope::Raw(trimmed[start..].trim().to_string()));
                break;
            }
        }
    }

    envelopes
}

fn report_json(report: &HandleReport) -> Value {
    let remediation = report.remediation.as_ref().map(|outcome| {
        json!({
            "reactivation_attempted": outcome.reactivation_attempted,
            "reactivation_succeeded": outcome.reactivation_succeeded,
            "lockdown_attempted": outcome.lockdown_attempted,
            "lockdown_succeeded": outcome.lockdown_succeeded,
            "errors": outcome
                .errors
                .iter()
                .map(|error| json!({ "step": error.step, "cause": error.cause.to_string() }))
                .collect::<Vec<_>>(),
        })
    });

    json!({
        "event_name": report.event.event_name(),
        "identity": report.event.source_identity_name(),
        "resource": report.event.affected_resource_id(),
        "action": report.action,
        "notified": report.notified(),
        "notification_error": report.notification.as_ref().err().map(ToString::to_string),
        "remediation": remediation,
    })
}
