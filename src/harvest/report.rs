//! Per-page, per-job and per-run results

use crate::search::SearchQuery;
use serde::Serialize;

/// An item that was not stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    /// Absolute result index (offset + position)
    pub index: u32,
    pub key: String,
    pub link: String,
    /// Error category ("network", "store", "worker", ...)
    pub kind: &'static str,
    pub error: String,
}

/// Result of one page: search call plus its fetch/store fan-out
#[derive(Debug, Clone, Serialize)]
pub struct PageReport {
    pub query: SearchQuery,
    /// Items returned by the search call
    pub items_found: usize,
    /// Items fetched and stored
    pub stored: usize,
    pub bytes_stored: u64,
    pub failures: Vec<ItemFailure>,
    /// Set when the search call itself failed
    pub search_error: Option<String>,
}

impl PageReport {
    pub fn new(query: SearchQuery, items_found: usize) -> Self {
        Self {
            query,
            items_found,
            stored: 0,
            bytes_stored: 0,
            failures: Vec::new(),
            search_error: None,
        }
    }

    pub fn search_failed(query: SearchQuery, error: impl ToString) -> Self {
        Self {
            search_error: Some(error.to_string()),
            ..Self::new(query, 0)
        }
    }

    pub fn is_clean(&self) -> bool {
        self.search_error.is_none() && self.failures.is_empty()
    }
}

/// Aggregate outcome of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    /// Every page searched and every item stored
    Succeeded { stored: usize },
    /// Some images stored, some pages or items failed
    PartiallyFailed {
        stored: usize,
        failed_items: usize,
        failed_pages: usize,
    },
    /// Nothing stored and at least one failure
    Failed { reason: String },
}

impl JobOutcome {
    /// Classify a job from its page reports
    pub fn from_pages(pages: &[PageReport]) -> Self {
        let stored: usize = pages.iter().map(|p| p.stored).sum();
        let failed_items: usize = pages.iter().map(|p| p.failures.len()).sum();
        let failed_pages = pages.iter().filter(|p| p.search_error.is_some()).count();

        if pages.iter().all(PageReport::is_clean) {
            return Self::Succeeded { stored };
        }
        if stored == 0 {
            let reason = match pages.iter().find_map(|p| p.search_error.as_ref()) {
                Some(error) if failed_pages == pages.len() => {
                    format!("all {} searches failed, last: {}", failed_pages, error)
                }
                _ => format!(
                    "no image stored ({} pages and {} items failed)",
                    failed_pages, failed_items
                ),
            };
            return Self::Failed { reason };
        }
        Self::PartiallyFailed {
            stored,
            failed_items,
            failed_pages,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Result of one configured phrase
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub phrase: String,
    pub pages: Vec<PageReport>,
    pub outcome: JobOutcome,
}

impl JobReport {
    pub fn new(phrase: impl Into<String>, pages: Vec<PageReport>) -> Self {
        let outcome = JobOutcome::from_pages(&pages);
        Self {
            phrase: phrase.into(),
            pages,
            outcome,
        }
    }
}

/// Result of a whole run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub jobs: Vec<JobReport>,
}

impl RunReport {
    pub fn failed_jobs(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs.iter().filter(|j| j.outcome.is_failed())
    }

    pub fn images_stored(&self) -> usize {
        self.jobs
            .iter()
            .flat_map(|j| j.pages.iter())
            .map(|p| p.stored)
            .sum()
    }

    /// Process exit status: non-zero when any job failed outright
    pub fn exit_code(&self) -> i32 {
        if self.failed_jobs().next().is_some() {
            1
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(offset: u32, found: usize, stored: usize, failed: usize) -> PageReport {
        let mut report = PageReport::new(SearchQuery::new("quercus lobata", offset), found);
        report.stored = stored;
        report.failures = (0..failed as u32)
            .map(|i| ItemFailure {
                index: offset + i,
                key: format!("validation/quercus_lobata/{}.jpg", offset + i),
                link: "https://img.example.com/x.jpg".to_string(),
                kind: "network",
                error: "timed out".to_string(),
            })
            .collect();
        report
    }

    #[test]
    fn test_clean_job_succeeds() {
        let outcome = JobOutcome::from_pages(&[page(0, 10, 10, 0), page(10, 10, 10, 0)]);
        assert_eq!(outcome, JobOutcome::Succeeded { stored: 20 });
    }

    #[test]
    fn test_empty_results_succeed() {
        let outcome = JobOutcome::from_pages(&[page(0, 0, 0, 0)]);
        assert_eq!(outcome, JobOutcome::Succeeded { stored: 0 });
    }

    #[test]
    fn test_partial_failure() {
        let failed_search = PageReport::search_failed(SearchQuery::new("quercus lobata", 20), "boom");
        let outcome = JobOutcome::from_pages(&[page(0, 10, 9, 1), page(10, 10, 10, 0), failed_search]);
        assert_eq!(
            outcome,
            JobOutcome::PartiallyFailed {
                stored: 19,
                failed_items: 1,
                failed_pages: 1
            }
        );
    }

    #[test]
    fn test_failed_search_alone_is_partial_failure() {
        let failed_search = PageReport::search_failed(SearchQuery::new("quercus lobata", 10), "HTTP 500");
        let outcome = JobOutcome::from_pages(&[page(0, 10, 10, 0), failed_search]);
        assert_eq!(
            outcome,
            JobOutcome::PartiallyFailed {
                stored: 10,
                failed_items: 0,
                failed_pages: 1
            }
        );
    }

    #[test]
    fn test_all_searches_failed() {
        let pages: Vec<_> = [0, 10]
            .into_iter()
            .map(|o| PageReport::search_failed(SearchQuery::new("oak", o), "HTTP 403"))
            .collect();
        let outcome = JobOutcome::from_pages(&pages);
        assert!(outcome.is_failed());
    }

    #[test]
    fn test_exit_code() {
        let ok = JobReport::new("oak", vec![page(0, 2, 2, 0)]);
        let failed = JobReport::new("elm", vec![page(0, 2, 0, 2)]);

        let report = RunReport {
            jobs: vec![ok.clone()],
        };
        assert_eq!(report.exit_code(), 0);

        let report = RunReport {
            jobs: vec![ok, failed],
        };
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.images_stored(), 2);
        assert_eq!(report.failed_jobs().count(), 1);
    }
}
