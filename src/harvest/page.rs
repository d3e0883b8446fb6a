//! Page driver: one search call, bounded fan-out, completion barrier

use super::report::{ItemFailure, PageReport};
use super::worker::{Fetcher, WorkItem};
use crate::error::HarvestError;
use crate::metrics::Metrics;
use crate::search::{ImageSearch, SearchPage, SearchQuery};
use crate::storage::StorageKey;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

type SharedQueue = Arc<Mutex<mpsc::Receiver<WorkItem>>>;
type OutcomeSender = mpsc::Sender<(u32, ItemOutcome)>;

#[derive(Debug)]
enum ItemOutcome {
    Stored { bytes: u64 },
    Failed(ItemFailure),
}

/// Runs single pages of a harvest
#[derive(Clone)]
pub struct PageDriver {
    search: Arc<dyn ImageSearch>,
    fetcher: Fetcher,
    base_prefix: String,
    concurrency: usize,
    metrics: Arc<Metrics>,
}

impl PageDriver {
    pub fn new(
        search: Arc<dyn ImageSearch>,
        fetcher: Fetcher,
        base_prefix: impl Into<String>,
        concurrency: usize,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            search,
            fetcher,
            base_prefix: base_prefix.into(),
            concurrency: concurrency.max(1),
            metrics,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.search.page_size()
    }

    /// Search one page and store every returned image
    ///
    /// Returns only after every queued item finished, stored or failed. A
    /// failed search fails this page alone.
    pub async fn run_page(&self, query: SearchQuery) -> PageReport {
        let start = Instant::now();
        let page = match self.search.fetch_page(&query).await {
            Ok(page) => {
                self.metrics.record_search(start.elapsed());
                page
            }
            Err(e) => {
                self.metrics.record_failure("search", e.kind());
                error!(
                    "Search for '{}' at offset {} failed: {}",
                    query.phrase, query.offset, e
                );
                return PageReport::search_failed(query, e);
            }
        };

        debug!(
            "Search for '{}' at offset {} returned {} items",
            query.phrase,
            query.offset,
            page.len()
        );
        let items = self.work_items(&query, page);
        let mut report = PageReport::new(query, items.len());
        if items.is_empty() {
            info!(
                "No results for '{}' at offset {}",
                report.query.phrase, report.query.offset
            );
            return report;
        }

        let (outcomes, worker_errors) = self.fan_out(items.clone()).await;

        let mut finished = BTreeSet::new();
        for (index, outcome) in outcomes {
            finished.insert(index);
            match outcome {
                ItemOutcome::Stored { bytes } => {
                    report.stored += 1;
                    report.bytes_stored += bytes;
                }
                ItemOutcome::Failed(failure) => report.failures.push(failure),
            }
        }

        // Items in flight or still queued when their worker died
        let reason = if worker_errors.is_empty() {
            "worker stopped before processing the item".to_string()
        } else {
            worker_errors.join("; ")
        };
        for item in items.into_iter().filter(|i| !finished.contains(&i.index)) {
            let err = HarvestError::Worker(reason.clone());
            report.failures.push(ItemFailure {
                index: item.index,
                key: item.key.to_string(),
                link: item.link,
                kind: err.kind(),
                error: err.to_string(),
            });
        }
        report.failures.sort_by_key(|f| f.index);

        info!(
            "Page '{}' offset {}: {}/{} stored in {:?}",
            report.query.phrase,
            report.query.offset,
            report.stored,
            report.items_found,
            start.elapsed()
        );
        report
    }

    fn work_items(&self, query: &SearchQuery, page: SearchPage) -> Vec<WorkItem> {
        page.items
            .into_iter()
            .zip(query.offset..)
            .map(|(item, index)| WorkItem {
                index,
                key: StorageKey::new(&self.base_prefix, &query.phrase, index),
                link: item.link,
            })
            .collect()
    }

    /// Queue items to a fixed pool of workers and wait for all of them
    ///
    /// Workers report each item as soon as it finishes, so a worker that
    /// panics only loses the item it was holding. Returns the reported
    /// outcomes and the reasons of any workers that died.
    async fn fan_out(&self, items: Vec<WorkItem>) -> (Vec<(u32, ItemOutcome)>, Vec<String>) {
        let worker_count = self.concurrency.min(items.len());
        let (sender, receiver) = mpsc::channel(items.len());
        // Each item reports at most once, so neither channel ever fills up.
        let (outcome_tx, mut outcome_rx) = mpsc::channel(items.len());
        for item in items {
            if sender.send(item).await.is_err() {
                break;
            }
        }
        drop(sender);

        let queue: SharedQueue = Arc::new(Mutex::new(receiver));
        let mut join_set = JoinSet::new();
        for worker_idx in 0..worker_count {
            let queue = Arc::clone(&queue);
            let fetcher = self.fetcher.clone();
            let outcomes = outcome_tx.clone();
            join_set.spawn(async move { run_worker(worker_idx, queue, fetcher, outcomes).await });
        }
        drop(outcome_tx);

        let mut worker_errors = Vec::new();
        while let Some(result) = join_set.join_next().await {
            if let Err(join_err) = result {
                let reason = describe_join_error(join_err);
                self.metrics.record_failure("worker", "worker");
                error!("Worker task failed: {}", reason);
                worker_errors.push(reason);
            }
        }

        // All senders are gone once the pool has drained.
        let mut outcomes = Vec::new();
        while let Some(outcome) = outcome_rx.recv().await {
            outcomes.push(outcome);
        }
        (outcomes, worker_errors)
    }
}

async fn run_worker(worker_idx: usize, queue: SharedQueue, fetcher: Fetcher, outcomes: OutcomeSender) {
    loop {
        let Some(item) = next_item(&queue).await else {
            debug!("Worker {} finished (queue drained)", worker_idx);
            break;
        };

        let outcome = match fetcher.fetch_and_store(&item.key, &item.link).await {
            Ok(bytes) => ItemOutcome::Stored { bytes },
            Err(e) => {
                warn!("Could not harvest {} into {}: {}", item.link, item.key, e);
                ItemOutcome::Failed(ItemFailure {
                    index: item.index,
                    key: item.key.to_string(),
                    link: item.link.clone(),
                    kind: e.kind(),
                    error: e.to_string(),
                })
            }
        };
        if outcomes.send((item.index, outcome)).await.is_err() {
            break;
        }
    }
}

async fn next_item(queue: &SharedQueue) -> Option<WorkItem> {
    let mut guard = queue.lock().await;
    guard.recv().await
}

fn describe_join_error(err: JoinError) -> String {
    if !err.is_panic() {
        return "cancelled".to_string();
    }
    let payload = err.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::testing::{image_server, MockSearch};
    use crate::network::HttpClient;
    use crate::search::SearchResultItem;
    use crate::storage::testing::MemoryStore;

    fn driver(search: Arc<MockSearch>, store: Arc<MemoryStore>, concurrency: usize) -> PageDriver {
        let metrics = Arc::new(Metrics::new());
        let fetcher = Fetcher::new(
            HttpClient::new().unwrap(),
            store,
            "treefinder",
            None,
            metrics.clone(),
        );
        PageDriver::new(search, fetcher, "validation", concurrency, metrics)
    }

    #[tokio::test]
    async fn test_two_items_at_offset_zero() {
        let server = image_server().await;
        let search = Arc::new(MockSearch::new().page(
            "quercus lobata",
            0,
            vec![
                SearchResultItem::new("a", format!("{}/a", server.uri())),
                SearchResultItem::new("b", format!("{}/b", server.uri())),
            ],
        ));
        let store = Arc::new(MemoryStore::default());

        let report = driver(search.clone(), store.clone(), 10)
            .run_page(SearchQuery::new("quercus lobata", 0))
            .await;

        assert_eq!(
            store.keys(),
            vec![
                "validation/quercus_lobata/0.jpg",
                "validation/quercus_lobata/1.jpg"
            ]
        );
        assert_eq!(report.stored, 2);
        assert!(report.is_clean());
        assert_eq!(search.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_two_items_at_offset_ten() {
        let server = image_server().await;
        let search = Arc::new(MockSearch::new().page(
            "quercus lobata",
            10,
            vec![
                SearchResultItem::new("a", format!("{}/a", server.uri())),
                SearchResultItem::new("b", format!("{}/b", server.uri())),
            ],
        ));
        let store = Arc::new(MemoryStore::default());

        driver(search, store.clone(), 10)
            .run_page(SearchQuery::new("quercus lobata", 10))
            .await;

        assert_eq!(
            store.keys(),
            vec![
                "validation/quercus_lobata/10.jpg",
                "validation/quercus_lobata/11.jpg"
            ]
        );
    }

    #[tokio::test]
    async fn test_every_item_processed_with_small_pool() {
        let server = image_server().await;
        let items = (0..10)
            .map(|i| SearchResultItem::new(i.to_string(), format!("{}/img/{}", server.uri(), i)))
            .collect();
        let search = Arc::new(MockSearch::new().page("oak", 0, items));
        let store = Arc::new(MemoryStore::default());

        let report = driver(search, store.clone(), 3)
            .run_page(SearchQuery::new("oak", 0))
            .await;

        assert_eq!(report.items_found, 10);
        assert_eq!(report.stored, 10);
        assert_eq!(store.keys().len(), 10);
    }

    #[tokio::test]
    async fn test_failed_fetch_releases_barrier() {
        let server = image_server().await;
        let search = Arc::new(MockSearch::new().page(
            "oak",
            0,
            vec![
                SearchResultItem::new("ok", format!("{}/a", server.uri())),
                SearchResultItem::new("gone", format!("{}/missing", server.uri())),
                SearchResultItem::new("ok", format!("{}/b", server.uri())),
            ],
        ));
        let store = Arc::new(MemoryStore::default());

        let report = driver(search, store.clone(), 10)
            .run_page(SearchQuery::new("oak", 0))
            .await;

        assert_eq!(report.stored, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.failures[0].kind, "network");
        assert_eq!(store.keys(), vec!["validation/oak/0.jpg", "validation/oak/2.jpg"]);
    }

    #[tokio::test]
    async fn test_store_failure_is_isolated() {
        let server = image_server().await;
        let items = (0..4)
            .map(|i| SearchResultItem::new("", format!("{}/img/{}", server.uri(), i)))
            .collect();
        let search = Arc::new(MockSearch::new().page("oak", 0, items));
        let store = Arc::new(MemoryStore::failing_on(&["validation/oak/2.jpg"]));

        let report = driver(search, store.clone(), 4)
            .run_page(SearchQuery::new("oak", 0))
            .await;

        assert_eq!(report.stored, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].key, "validation/oak/2.jpg");
        assert_eq!(report.failures[0].kind, "store");
        assert_eq!(
            store.keys(),
            vec![
                "validation/oak/0.jpg",
                "validation/oak/1.jpg",
                "validation/oak/3.jpg"
            ]
        );
    }

    #[tokio::test]
    async fn test_search_failure_fails_page_only() {
        let search = Arc::new(MockSearch::new());
        let store = Arc::new(MemoryStore::default());

        let report = driver(search, store.clone(), 10)
            .run_page(SearchQuery::new("oak", 0))
            .await;

        assert!(report.search_error.is_some());
        assert_eq!(report.items_found, 0);
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn test_panicking_worker_keeps_finished_items() {
        let server = image_server().await;
        let items = (0..3)
            .map(|i| SearchResultItem::new("", format!("{}/img/{}", server.uri(), i)))
            .collect();
        let search = Arc::new(MockSearch::new().page("oak", 0, items));
        let store = Arc::new(MemoryStore::panicking_on(&["validation/oak/1.jpg"]));

        let report = driver(search, store.clone(), 1)
            .run_page(SearchQuery::new("oak", 0))
            .await;

        assert_eq!(store.keys(), vec!["validation/oak/0.jpg"]);
        assert_eq!(report.stored, store.keys().len());
        let failed: Vec<u32> = report.failures.iter().map(|f| f.index).collect();
        assert_eq!(failed, vec![1, 2]);
        for failure in &report.failures {
            assert_eq!(failure.kind, "worker");
            assert!(failure.error.contains("disk on fire"), "{}", failure.error);
        }
    }

    #[tokio::test]
    async fn test_panicking_worker_leaves_queue_to_the_rest() {
        let server = image_server().await;
        let items = (0..3)
            .map(|i| SearchResultItem::new("", format!("{}/img/{}", server.uri(), i)))
            .collect();
        let search = Arc::new(MockSearch::new().page("oak", 0, items));
        let store = Arc::new(MemoryStore::panicking_on(&["validation/oak/1.jpg"]));

        let report = driver(search, store.clone(), 3)
            .run_page(SearchQuery::new("oak", 0))
            .await;

        assert_eq!(store.keys(), vec!["validation/oak/0.jpg", "validation/oak/2.jpg"]);
        assert_eq!(report.stored, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert!(report.failures[0].error.starts_with("worker task failed: panicked"));
    }
}
