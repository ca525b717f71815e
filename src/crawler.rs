use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::fetcher::PageFetcher;
use crate::parser::parse_page;
use crate::pool::{Submitter, Task, TaskRunner, WorkerPool};
use crate::stats::CrawlStats;
use crate::tracker::CompletionTracker;
use crate::visited::{CrawlRecord, VisitedStore};

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("worker count must be at least 1")]
    NoWorkers,
}

/// Drives one crawl: seeds the pool, waits for the tracker to drain, returns
/// the collected pages. `cancel` may be called from anywhere at any time; it
/// stops new work from starting while in-flight fetches finish naturally.
pub struct Crawler {
    fetcher: Arc<dyn PageFetcher>,
    cancel: CancellationToken,
    stats: CrawlStats,
}

struct CrawlContext {
    fetcher: Arc<dyn PageFetcher>,
    visited: Arc<VisitedStore>,
    cancel: CancellationToken,
    stats: CrawlStats,
    max_depth: usize,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            cancel: CancellationToken::new(),
            stats: CrawlStats::new(),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    pub async fn run(
        &self,
        seeds: &[String],
        max_depth: usize,
        max_workers: usize,
    ) -> Result<BTreeMap<String, CrawlRecord>, CrawlError> {
        if max_workers == 0 {
            return Err(CrawlError::NoWorkers);
        }

        let tracker = Arc::new(CompletionTracker::new());
        let visited = Arc::new(VisitedStore::new());
        let ctx = Arc::new(CrawlContext {
            fetcher: self.fetcher.clone(),
            visited: visited.clone(),
            cancel: self.cancel.clone(),
            stats: self.stats.clone(),
            max_depth,
        });

        let pool = WorkerPool::start(max_workers, tracker.clone(), ctx);
        for seed in seeds {
            pool.submit(Task {
                url: seed.clone(),
                depth: 0,
            });
        }
        info!(
            "crawl started with {} seeds (workers={}, max_depth={})",
            seeds.len(),
            max_workers,
            max_depth
        );

        tracker.wait_idle().await;
        pool.shutdown().await;

        if self.cancel.is_cancelled() {
            info!("crawl cancelled; {} pages collected", visited.len());
        } else {
            info!("crawl drained; {} pages collected", visited.len());
        }
        Ok(visited.snapshot())
    }
}

#[async_trait]
impl TaskRunner for CrawlContext {
    async fn run_task(&self, task: Task, submitter: &Submitter) {
        if self.cancel.is_cancelled() {
            self.stats.record_cancelled();
            return;
        }
        if task.depth >= self.max_depth {
            self.stats.record_skipped_depth();
            debug!("depth limit reached at {}", task.url);
            return;
        }
        if !self.visited.try_reserve(&task.url) {
            self.stats.record_skipped_visited();
            debug!("already visited {}", task.url);
            return;
        }

        let page = match self.fetcher.fetch(&task.url).await {
            Ok(page) => page,
            Err(err) => {
                self.stats.record_failed();
                info!("fetch failed for {}: {err}", task.url);
                return;
            }
        };

        let body = String::from_utf8_lossy(&page.body).to_string();
        let parsed = parse_page(&body);
        self.stats.record_fetched();
        debug!(
            "fetched {} ({} headers, {} links)",
            task.url,
            parsed.headers.len(),
            parsed.links.len()
        );

        let base = Url::parse(&task.url).unwrap_or_else(|_| page.final_url.clone());
        self.visited.put(CrawlRecord {
            url: task.url,
            content: parsed.prettified,
            headers: parsed.headers,
        });

        for href in parsed.links {
            if self.cancel.is_cancelled() {
                return;
            }
            self.stats.record_discovered();
            submitter.submit(Task {
                url: resolve_link(&base, &href),
                depth: task.depth + 1,
            });
        }
    }
}

// Only root-relative hrefs are resolved, against the referencing page's
// origin. Everything else is taken verbatim; an href that never parses as an
// absolute URL fails at fetch time instead.
fn resolve_link(base: &Url, href: &str) -> String {
    if href.starts_with('/') {
        format!("{}{}", base.origin().ascii_serialization(), href)
    } else {
        href.to_string()
    }
}
