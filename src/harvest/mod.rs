//! Harvest pipeline
//!
//! The [`Harvester`] walks the configured jobs page by page. Each page is
//! searched once, its items are fanned out to a bounded pool of
//! fetch-and-store workers, and the driver waits for all of them before the
//! next page starts.

mod orchestrator;
mod page;
mod report;
mod worker;

pub use orchestrator::{HarvestOptions, Harvester};
pub use page::PageDriver;
pub use report::{ItemFailure, JobOutcome, JobReport, PageReport, RunReport};
pub use worker::{Fetcher, WorkItem};
