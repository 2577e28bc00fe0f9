//! DriveLens pipeline — turn road-scene detections into a driving strategy.
//!
//! Usage:
//!   dl-pipeline <config.toml> run <image> [boxes.json|-] [addendum...]
//!   dl-pipeline <config.toml> latest
//!   dl-pipeline <config.toml> history

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use tracing_subscriber::EnvFilter;

use dl_pipeline::config::PipelineConfig;
use dl_pipeline::detector::BoxFileDetector;
use dl_pipeline::inference::{ImageSource, OpenAiVisionClient};
use dl_pipeline::orchestrator::{Orchestrator, RunRequest};
use dl_store::{MemoryRecordStore, RecordStore, SqliteRecordStore};

const USAGE: &str = "usage: dl-pipeline <config.toml> (run <image> [boxes.json|-] [addendum...] | latest | history)";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dl-pipeline starting");

    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "drivelens.toml".to_string());
    let command = args.next().unwrap_or_else(|| "history".to_string());

    // ── Load config ─────────────────────────────────────────────
    let config = PipelineConfig::from_file(&config_path)
        .with_context(|| format!("failed to load config from {config_path}"))?;
    tracing::info!(
        model = %config.inference.model,
        scan = ?config.parser.scan,
        record_failed_runs = config.record_failed_runs,
        "config loaded"
    );

    // ── Record store ────────────────────────────────────────────
    let store: Arc<dyn RecordStore> = match &config.store.database_url {
        Some(url) => {
            tracing::info!("opening SQLite driving log");
            Arc::new(SqliteRecordStore::connect(url, config.store.max_connections).await?)
        }
        None => {
            tracing::warn!("no database_url configured; driving log is in-memory only");
            Arc::new(MemoryRecordStore::new())
        }
    };
    tracing::info!(backend = store.backend_name(), "record store ready");

    // ── Inference client ────────────────────────────────────────
    if config.inference.api_key.is_none() {
        tracing::warn!("no API key configured; inference calls will be rejected");
    }
    let client = OpenAiVisionClient::new(config.inference.clone())?;

    let mut orchestrator =
        Orchestrator::new(Arc::new(client), store, config.orchestrator_config());

    match command.as_str() {
        "run" => {
            let Some(image) = args.next() else {
                bail!(USAGE);
            };
            if let Some(boxes) = args.next().filter(|b| b != "-") {
                orchestrator = orchestrator.with_detector(Arc::new(BoxFileDetector::new(boxes)));
            }
            let addendum: Vec<String> = args.collect();

            let mut request = RunRequest::new(ImageSource::Path(PathBuf::from(image)));
            if !addendum.is_empty() {
                request = request.with_addendum(addendum.join(" "));
            }

            let run = orchestrator.run(request).await?;
            println!("{}", serde_json::to_string_pretty(&run)?);
        }
        "latest" => {
            let latest = orchestrator.latest().await?;
            println!("{}", serde_json::to_string_pretty(&latest)?);
        }
        "history" => {
            let records = orchestrator.history().await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        other => bail!("unknown command '{other}'\n{USAGE}"),
    }

    tracing::info!("dl-pipeline finished");
    Ok(())
}
