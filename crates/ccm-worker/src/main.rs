// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
//! The long-running fan-out worker.

mod credentials_file;
mod queue_http;

use anyhow::{Context, Result, bail};
use ccm_config::AppConfig;
use ccm_credentials::CredentialBroker;
use ccm_email::HttpEmailGateway;
use ccm_meeting::HttpMeetingProvider;
use ccm_processor::{TriggerProcessor, drive_once};
use ccm_store::{HttpStore, RetryPolicy, RetryingStore};
use clap::Parser;
use queue_http::HttpQueueSource;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ccm-worker", version, about = "Customer contact manager fan-out worker")]
struct Args {
    /// Path to the TOML configuration.
    #[arg(long, default_value = "ccm.toml")]
    config: PathBuf,

    /// Path to the TOML credentials secret.
    #[arg(long, default_value = "ccm-credentials.toml")]
    credentials: PathBuf,

    /// Only poll this customer's queue.
    #[arg(long)]
    customer: Option<String>,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,

    /// Emit logs as JSON (one object per line).
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("ccm=debug,ccm_processor=debug,ccm_worker=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    if args.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = Arc::new(
        AppConfig::load(&args.config)
            .with_context(|| format!("load config {}", args.config.display()))?,
    );
    for warning in config.warnings() {
        warn!(?warning, "configuration warning");
    }

    let Some(store_endpoint) = config.store.endpoint.clone() else {
        bail!("store.endpoint is required to run the worker");
    };
    let Some(queue_endpoint) = config.queue.endpoint.clone() else {
        bail!("queue.endpoint is required to run the worker");
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("build http client")?;

    let store_policy = RetryPolicy::builder()
        .max_retries(config.processing.store_max_attempts.saturating_sub(1))
        .build();
    let store = Arc::new(RetryingStore::new(
        HttpStore::new(client.clone(), store_endpoint, config.bucket.clone()),
        store_policy,
    ));

    let source = credentials_file::load(&args.credentials)?;
    let broker = Arc::new(CredentialBroker::new(
        Arc::new(source),
        config.customers.clone(),
        chrono::Duration::seconds(config.processing.credential_ttl_margin_secs as i64),
    ));
    let gateway = Arc::new(HttpEmailGateway::new(
        client.clone(),
        config.clone(),
        broker,
    ));
    let provider = Arc::new(HttpMeetingProvider::new(
        client.clone(),
        config.meeting_provider.base_url.clone(),
    ));

    let processor = TriggerProcessor::new(config.clone(), store, gateway, provider);

    let queues: Vec<HttpQueueSource> = config
        .customers
        .iter()
        .filter(|c| {
            args.customer
                .as_deref()
                .is_none_or(|only| only == c.customer_code)
        })
        .map(|c| {
            HttpQueueSource::new(
                client.clone(),
                queue_endpoint.clone(),
                c.queue_identifier.clone(),
                config.queue.wait_seconds,
            )
        })
        .collect();
    if queues.is_empty() {
        bail!("no queues to poll; check --customer against the configured directory");
    }

    info!(
        bucket = config.bucket.as_str(),
        queues = queues.len(),
        "ccm-worker polling"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        for queue in &queues {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("interrupt received; draining and exiting");
                    return Ok(());
                }
                result = drive_once(&processor, queue, config.queue.max_messages) => {
                    if let Err(fault) = result {
                        warn!(
                            queue = queue.queue_identifier(),
                            error = %fault,
                            "queue poll failed; backing off"
                        );
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }
    }
}
