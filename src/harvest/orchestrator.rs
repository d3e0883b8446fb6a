//! Run-level orchestration of configured jobs

use super::page::PageDriver;
use super::report::{JobOutcome, JobReport, RunReport};
use super::worker::Fetcher;
use crate::config::{JobConfig, Settings};
use crate::metrics::Metrics;
use crate::network::HttpClient;
use crate::search::{ImageSearch, SearchQuery};
use crate::storage::ObjectStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Knobs of the harvest pipeline
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    pub bucket: String,
    pub base_prefix: String,
    /// Worker tasks per page
    pub concurrency: usize,
    pub image_timeout: Option<Duration>,
}

impl HarvestOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            bucket: settings.storage.bucket.clone(),
            base_prefix: settings.storage.base_prefix.clone(),
            concurrency: settings.harvest.concurrency,
            image_timeout: settings.outgoing.image_timeout(),
        }
    }
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Runs jobs one after another, pages of a job in offset order
pub struct Harvester {
    driver: PageDriver,
    metrics: Arc<Metrics>,
}

impl Harvester {
    pub fn new(
        search: Arc<dyn ImageSearch>,
        store: Arc<dyn ObjectStore>,
        client: HttpClient,
        options: HarvestOptions,
    ) -> Self {
        let metrics = Arc::new(Metrics::new());
        let fetcher = Fetcher::new(
            client,
            store,
            &options.bucket,
            options.image_timeout,
            metrics.clone(),
        );
        let driver = PageDriver::new(
            search,
            fetcher,
            options.base_prefix,
            options.concurrency,
            metrics.clone(),
        );
        Self { driver, metrics }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Run every job to completion and aggregate the outcomes
    pub async fn run(&self, jobs: &[JobConfig]) -> RunReport {
        let mut report = RunReport::default();

        for job in jobs {
            let job_report = self.run_job(job).await;
            match &job_report.outcome {
                JobOutcome::Succeeded { stored } => {
                    info!("Job '{}' succeeded: {} images stored", job.phrase, stored)
                }
                JobOutcome::PartiallyFailed {
                    stored,
                    failed_items,
                    failed_pages,
                } => warn!(
                    "Job '{}' partially failed: {} stored, {} items and {} pages failed",
                    job.phrase, stored, failed_items, failed_pages
                ),
                JobOutcome::Failed { reason } => error!("Job '{}' failed: {}", job.phrase, reason),
            }
            report.jobs.push(job_report);
        }

        report
    }

    /// Harvest every page of one phrase, strictly in order
    pub async fn run_job(&self, job: &JobConfig) -> JobReport {
        let offsets = job.offsets(self.driver.page_size());
        info!("Harvesting '{}' ({} pages)", job.phrase, offsets.len());

        let mut pages = Vec::with_capacity(offsets.len());
        for offset in offsets {
            let query = SearchQuery::new(job.phrase.clone(), offset);
            pages.push(self.driver.run_page(query).await);
        }

        JobReport::new(job.phrase.clone(), pages)
    }
}
