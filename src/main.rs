//! image-harvester: bulk image harvesting from an image search API into object storage
//!
//! This is the main entry point for the application.

use anyhow::{Context, Result};
use image_harvester::{
    config,
    harvest::{HarvestOptions, Harvester},
    network::HttpClient,
    search::CustomSearch,
    secrets::{self, Secret},
    storage,
};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Starting image-harvester v{}", image_harvester::VERSION);

    // Load configuration
    let settings = config::init(config::load()?)?;
    info!(
        "Loaded configuration: {} jobs, bucket {}",
        settings.harvest.jobs.len(),
        settings.storage.bucket
    );

    // Initialize HTTP client
    let client = HttpClient::with_settings(&settings.outgoing)?;

    // Resolve credentials once
    let secret_store = secrets::provider_from_settings(&settings.secrets, client.clone())?;
    let api_key = match settings.search.api_key {
        Some(ref key) => Secret::new(key.clone()),
        None => secrets::resolve(&secret_store, &settings.search.api_key_param)
            .await
            .with_context(|| format!("resolving {}", settings.search.api_key_param))?,
    };
    let store_credentials = storage::resolve_credentials(&settings.storage, &secret_store)
        .await
        .context("resolving storage credentials")?;

    let search = Arc::new(CustomSearch::new(client.clone(), &settings.search, api_key)?);
    let store = storage::store_from_settings(&settings.storage, client.clone(), store_credentials)?;
    info!("Uploading through the {} object store", store.name());

    let harvester = Harvester::new(search, store, client, HarvestOptions::from_settings(settings));
    let report = harvester.run(&settings.harvest.jobs).await;

    let stats = harvester.metrics().snapshot();
    info!(
        "Run finished: {} searches, {} images stored ({} bytes), {} fetch, {} store and {} worker failures",
        stats.searches,
        report.images_stored(),
        stats.bytes_stored,
        stats.fetch_failures,
        stats.store_failures,
        stats.worker_failures
    );
    if let Some(avg) = stats.avg_search_time {
        info!("Average search time: {:?}", avg);
    }

    for job in report.failed_jobs() {
        error!("Job '{}' produced no images", job.phrase);
    }

    Ok(ExitCode::from(report.exit_code() as u8))
}
