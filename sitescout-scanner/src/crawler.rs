use crate::classify::classify;
use crate::error::{FetchError, ScanError};
use crate::estimator::Prescan;
use crate::extractor::LinkExtractor;
use crate::fetcher::{DEFAULT_FETCH_TIMEOUT, DEFAULT_USER_AGENT, PageFetcher};
use crate::frontier::{Frontier, QueueOrder};
use crate::normalize::{DomainScope, NormalizedUrl};
use crate::result::{Classification, CrawlReport, FetchRecord};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_PAGES: usize = 200;
pub const DEFAULT_MAX_DEPTH: usize = 3;
pub const DEFAULT_WORKERS: usize = 4;

/// Crawl-wide settings, fixed for the life of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Upper bound on fetch attempts.
    pub max_pages: usize,
    /// Links are not followed past this distance from the seed. `None` disables the bound.
    pub max_depth: Option<usize>,
    /// Fetches allowed in flight at once.
    pub workers: usize,
    pub order: QueueOrder,
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            max_depth: Some(DEFAULT_MAX_DEPTH),
            workers: DEFAULT_WORKERS,
            order: QueueOrder::default(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl CrawlConfig {
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_order(mut self, order: QueueOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.fetch_timeout_secs = secs;
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Snapshot passed to the progress callback as each fetch is dispatched.
#[derive(Debug, Clone)]
pub struct CrawlProgress {
    pub url: String,
    pub depth: usize,
    pub attempts: usize,
    pub max_pages: usize,
    pub pending: usize,
}

pub type ProgressCallback = Arc<dyn Fn(CrawlProgress) + Send + Sync>;

struct PageOutcome {
    url: NormalizedUrl,
    depth: usize,
    elapsed: Duration,
    links: Result<BTreeSet<NormalizedUrl>, FetchError>,
}

/// Frontier state owned by the scheduling loop. Nothing else mutates it.
struct CrawlState {
    frontier: Frontier,
    classification: Classification,
    fetch_log: Vec<FetchRecord>,
    attempts: usize,
}

impl CrawlState {
    fn new(order: QueueOrder) -> Self {
        Self {
            frontier: Frontier::new(order),
            classification: Classification::default(),
            fetch_log: Vec::new(),
            attempts: 0,
        }
    }

    /// Mark visited, classify and charge the budget. False if already visited.
    fn admit(&mut self, url: &NormalizedUrl, scope: &DomainScope) -> bool {
        if !self.frontier.mark_visited(url.clone()) {
            return false;
        }
        self.classification.record(classify(url, scope));
        self.attempts += 1;
        true
    }

    fn absorb(&mut self, outcome: PageOutcome, max_depth: Option<usize>) {
        let PageOutcome {
            url,
            depth,
            elapsed,
            links,
        } = outcome;

        match links {
            Ok(links) => {
                let mut record = FetchRecord::new(url.clone(), depth);
                record.response_time = elapsed;
                record.links_found = links.len();
                self.fetch_log.push(record);

                if max_depth.is_some_and(|max| depth >= max) {
                    debug!("Depth limit reached at {}, not expanding", url);
                    return;
                }
                let queued = self.frontier.extend(links, depth + 1);
                debug!("{} new links queued from {}", queued, url);
            }
            Err(e) => {
                warn!("{}", ScanError::FetchFailed(e.clone()));
                let mut record = FetchRecord::with_error(url, depth, e.reason.to_string());
                record.response_time = elapsed;
                self.fetch_log.push(record);
            }
        }
    }
}

/// Drives fetch, extract and enqueue over one site until the frontier is
/// exhausted, the page budget is spent, or the session is cancelled.
pub struct Crawler {
    fetcher: PageFetcher,
    extractor: LinkExtractor,
    config: CrawlConfig,
    progress_callback: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl Crawler {
    pub fn new(fetcher: PageFetcher, scope: DomainScope, config: CrawlConfig) -> Self {
        Self {
            fetcher,
            extractor: LinkExtractor::new(scope),
            config,
            progress_callback: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn scope(&self) -> &DomainScope {
        self.extractor.scope()
    }

    /// Crawl starting from the seed alone.
    pub async fn crawl(&self, seed: &NormalizedUrl) -> CrawlReport {
        let mut state = CrawlState::new(self.config.order);
        state.frontier.push(seed.clone(), 0);
        self.run(state).await
    }

    /// Crawl continuing from a prescan. Pages the prescan already fetched are
    /// adopted as visited, charged to the budget and not fetched again.
    pub async fn crawl_from_prescan(&self, prescan: &Prescan) -> CrawlReport {
        let mut state = CrawlState::new(self.config.order);
        let scope = self.scope().clone();

        for page in &prescan.pages {
            if state.attempts >= self.config.max_pages {
                break;
            }
            if !state.admit(&page.url, &scope) {
                continue;
            }
            state.absorb(
                PageOutcome {
                    url: page.url.clone(),
                    depth: page.depth,
                    elapsed: page.response_time,
                    links: page.outcome.clone(),
                },
                self.config.max_depth,
            );
        }
        debug!("Adopted {} prescan pages", state.attempts);

        if state.attempts == 0 {
            state.frontier.push(prescan.seed.clone(), 0);
        }
        self.run(state).await
    }

    async fn run(&self, mut state: CrawlState) -> CrawlReport {
        let scope = self.scope().clone();
        let max_pages = self.config.max_pages;
        let workers = self.config.workers.max(1);

        info!(
            "Starting crawl of {} ({} pages max, {} workers, {:?} order)",
            scope.seed_host, max_pages, workers, self.config.order
        );

        let mut in_flight = FuturesUnordered::new();
        let mut cancelled = self.cancel.is_cancelled();

        loop {
            while !cancelled && in_flight.len() < workers && state.attempts < max_pages {
                let Some((url, depth)) = state.frontier.pop() else {
                    break;
                };
                if !state.admit(&url, &scope) {
                    continue;
                }

                if let Some(ref callback) = self.progress_callback {
                    callback(CrawlProgress {
                        url: url.to_string(),
                        depth,
                        attempts: state.attempts,
                        max_pages,
                        pending: state.frontier.pending_len(),
                    });
                }

                in_flight.push(self.fetch_page(url, depth));
            }

            if in_flight.is_empty() {
                break;
            }

            let next = if cancelled {
                in_flight.next().await
            } else {
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        info!("Crawl cancelled, draining in-flight fetches");
                        cancelled = true;
                        continue;
                    }
                    next = in_flight.next() => next,
                }
            };

            let Some(outcome) = next else {
                break;
            };
            state.absorb(outcome, self.config.max_depth);
        }

        let CrawlState {
            frontier,
            classification,
            fetch_log,
            attempts,
        } = state;

        info!(
            "Crawl complete. {} fetch attempts, {} left pending",
            attempts,
            frontier.pending_len()
        );

        let pending_remaining = frontier.pending_len();
        CrawlReport {
            scope,
            classification,
            visited: frontier.into_visited().into_iter().collect(),
            fetch_log,
            pending_remaining,
            cancelled,
        }
    }

    async fn fetch_page(&self, url: NormalizedUrl, depth: usize) -> PageOutcome {
        let start = Instant::now();
        let links = self
            .fetcher
            .fetch(&url)
            .await
            .map(|content| self.extractor.links_on(&url, &content));

        PageOutcome {
            url,
            depth,
            elapsed: start.elapsed(),
            links,
        }
    }
}
