// Pre-crawl size estimation from a small sample of first-level links

use crate::error::{FetchError, Result, ScanError};
use crate::extractor::LinkExtractor;
use crate::fetcher::PageFetcher;
use crate::normalize::NormalizedUrl;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound on first-level links fetched as samples.
pub const DEFAULT_SAMPLE_SIZE: usize = 15;

/// Sample pages skew towards link-dense navigation pages, so the projection
/// for unsampled links is scaled down by this fixed factor.
pub const DAMPING_FACTOR: f64 = 0.7;

pub const DEFAULT_SAMPLE_TIMEOUT: Duration = Duration::from_secs(8);

const SAMPLE_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub sample_size: usize,
    pub sample_timeout_secs: u64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            sample_timeout_secs: DEFAULT_SAMPLE_TIMEOUT.as_secs(),
        }
    }
}

/// Advisory projection of how many URLs the site exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Estimate {
    pub sampled_url_count: usize,
    pub extrapolated_total: usize,
    pub first_level_links: usize,
    pub samples_attempted: usize,
    pub samples_succeeded: usize,
}

impl Estimate {
    /// True when the projected site is larger than the page budget.
    pub fn exceeds(&self, max_pages: usize) -> bool {
        self.extrapolated_total > max_pages
    }
}

/// A page the prescan already fetched, so the crawl can adopt it.
#[derive(Debug, Clone)]
pub struct PrescanPage {
    pub url: NormalizedUrl,
    pub depth: usize,
    pub response_time: Duration,
    pub outcome: std::result::Result<BTreeSet<NormalizedUrl>, FetchError>,
}

#[derive(Debug, Clone)]
pub struct Prescan {
    pub seed: NormalizedUrl,
    pub estimate: Estimate,
    /// Seed, first-level links and everything the samples linked to.
    pub discovered: BTreeSet<NormalizedUrl>,
    /// Seed first, then samples in the order they were taken.
    pub pages: Vec<PrescanPage>,
}

impl Prescan {
    /// A prescan that fetched nothing. Used when the page budget leaves no
    /// room for even the seed.
    pub fn unfetched(seed: NormalizedUrl) -> Self {
        Self {
            discovered: BTreeSet::from([seed.clone()]),
            seed,
            estimate: Estimate::default(),
            pages: Vec::new(),
        }
    }
}

/// Project the total URL count from the seed's links and a sample of their pages.
pub fn extrapolate(
    discovered_so_far: usize,
    first_level_links: usize,
    samples_attempted: usize,
    samples_succeeded: usize,
    new_links_from_samples: usize,
) -> usize {
    let avg_new_links = if samples_succeeded > 0 {
        new_links_from_samples as f64 / samples_succeeded as f64
    } else {
        0.0
    };
    let unsampled = first_level_links.saturating_sub(samples_attempted) as f64;
    let projected_remaining = avg_new_links * unsampled * DAMPING_FACTOR;
    discovered_so_far + projected_remaining.floor() as usize
}

pub struct SizeEstimator {
    fetcher: PageFetcher,
    extractor: LinkExtractor,
    sample_size: usize,
    sample_timeout: Duration,
}

impl SizeEstimator {
    pub fn new(fetcher: PageFetcher, extractor: LinkExtractor) -> Self {
        Self {
            fetcher,
            extractor,
            sample_size: DEFAULT_SAMPLE_SIZE,
            sample_timeout: DEFAULT_SAMPLE_TIMEOUT,
        }
    }

    pub fn with_config(self, config: &EstimatorConfig) -> Self {
        self.with_sample_size(config.sample_size)
            .with_sample_timeout(Duration::from_secs(config.sample_timeout_secs))
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn with_sample_timeout(mut self, timeout: Duration) -> Self {
        self.sample_timeout = timeout;
        self
    }

    /// Fetch the seed and a sample of its links. Fails only if the seed is unreachable.
    pub async fn estimate(&self, seed: &NormalizedUrl) -> Result<Prescan> {
        info!("Estimating size of {}", seed);

        let start = tokio::time::Instant::now();
        let content = self
            .fetcher
            .fetch(seed)
            .await
            .map_err(|e| ScanError::EstimationFailed {
                seed: seed.to_string(),
                reason: e.reason.to_string(),
            })?;
        let seed_time = start.elapsed();

        let first_level = self.extractor.links_on(seed, &content);
        debug!("Seed exposes {} first-level links", first_level.len());

        let mut discovered = first_level.clone();
        discovered.insert(seed.clone());

        let mut pages = vec![PrescanPage {
            url: seed.clone(),
            depth: 0,
            response_time: seed_time,
            outcome: Ok(first_level.clone()),
        }];

        // Same order the latest-first crawl would take them in
        let samples: Vec<NormalizedUrl> = first_level
            .iter()
            .rev()
            .take(self.sample_size)
            .cloned()
            .collect();
        let samples_attempted = samples.len();

        let fetched: Vec<PrescanPage> = stream::iter(samples)
            .map(|url| self.sample(url))
            .buffered(SAMPLE_CONCURRENCY)
            .collect()
            .await;

        let mut new_links_from_samples = 0;
        let mut samples_succeeded = 0;
        for page in &fetched {
            match &page.outcome {
                Ok(links) => {
                    samples_succeeded += 1;
                    for link in links {
                        if discovered.insert(link.clone()) {
                            new_links_from_samples += 1;
                        }
                    }
                }
                Err(e) => warn!("Sample fetch failed: {}", e),
            }
        }
        pages.extend(fetched);

        let estimate = Estimate {
            sampled_url_count: discovered.len(),
            extrapolated_total: extrapolate(
                discovered.len(),
                first_level.len(),
                samples_attempted,
                samples_succeeded,
                new_links_from_samples,
            ),
            first_level_links: first_level.len(),
            samples_attempted,
            samples_succeeded,
        };

        info!(
            "Estimate for {}: {} found, ~{} total",
            seed, estimate.sampled_url_count, estimate.extrapolated_total
        );

        Ok(Prescan {
            seed: seed.clone(),
            estimate,
            discovered,
            pages,
        })
    }

    async fn sample(&self, url: NormalizedUrl) -> PrescanPage {
        let start = tokio::time::Instant::now();
        let outcome = self
            .fetcher
            .fetch_with_timeout(&url, self.sample_timeout)
            .await
            .map(|content| self.extractor.links_on(&url, &content));

        PrescanPage {
            url,
            depth: 1,
            response_time: start.elapsed(),
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{DEFAULT_USER_AGENT, build_client};
    use crate::normalize::DomainScope;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn estimator_for(seed: &NormalizedUrl) -> SizeEstimator {
        let timeout = Duration::from_secs(5);
        let fetcher = PageFetcher::new(build_client(DEFAULT_USER_AGENT, timeout).unwrap(), timeout);
        SizeEstimator::new(fetcher, LinkExtractor::new(DomainScope::from_seed(seed)))
    }

    async fn mount_html(server: &MockServer, route: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
            .mount(server)
            .await;
    }

    #[test]
    fn test_extrapolate_damped() {
        // 10 first-level links, 2 sampled yielding 6 new links:
        // avg 3, 8 unsampled, floor(3 * 8 * 0.7) = 16
        assert_eq!(extrapolate(17, 10, 2, 2, 6), 33);
    }

    #[test]
    fn test_extrapolate_without_successful_samples() {
        assert_eq!(extrapolate(11, 10, 5, 0, 0), 11);
    }

    #[test]
    fn test_extrapolate_everything_sampled() {
        assert_eq!(extrapolate(30, 5, 5, 5, 24), 30);
    }

    #[test]
    fn test_estimate_exceeds_budget() {
        let estimate = Estimate {
            sampled_url_count: 10,
            extrapolated_total: 250,
            first_level_links: 9,
            samples_attempted: 9,
            samples_succeeded: 9,
        };
        assert!(estimate.exceeds(200));
        assert!(!estimate.exceeds(250));
    }

    #[tokio::test]
    async fn test_estimate_counts_only_new_links() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        mount_html(
            &mock_server,
            "/",
            format!(r#"<a href="{uri}/a">a</a><a href="{uri}/b">b</a>"#),
        )
        .await;
        // /a links back to /b (already known) and to one new page
        mount_html(
            &mock_server,
            "/a",
            format!(r#"<a href="{uri}/b">b</a><a href="{uri}/a/1">1</a>"#),
        )
        .await;
        mount_html(&mock_server, "/b", format!(r#"<a href="{uri}/b/1">1</a>"#)).await;

        let seed = NormalizedUrl::parse_seed(&uri).unwrap();
        let prescan = estimator_for(&seed).estimate(&seed).await.unwrap();

        assert_eq!(prescan.estimate.first_level_links, 2);
        assert_eq!(prescan.estimate.samples_attempted, 2);
        assert_eq!(prescan.estimate.samples_succeeded, 2);
        // seed + /a + /b + /a/1 + /b/1
        assert_eq!(prescan.estimate.sampled_url_count, 5);
        assert_eq!(prescan.estimate.extrapolated_total, 5);
        assert_eq!(prescan.pages.len(), 3);
        assert_eq!(prescan.pages[0].url, seed);
        assert_eq!(prescan.pages[1].url.path(), "/b");
    }

    #[tokio::test]
    async fn test_estimate_sample_cap_and_projection() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        let mut root = String::new();
        for i in 0..6 {
            root.push_str(&format!(r#"<a href="{uri}/p{i}">p</a>"#));
        }
        mount_html(&mock_server, "/", root).await;
        for i in 0..6 {
            mount_html(
                &mock_server,
                &format!("/p{i}"),
                format!(r#"<a href="{uri}/p{i}/x">x</a><a href="{uri}/p{i}/y">y</a>"#),
            )
            .await;
        }

        let seed = NormalizedUrl::parse_seed(&uri).unwrap();
        let prescan = estimator_for(&seed)
            .with_sample_size(2)
            .estimate(&seed)
            .await
            .unwrap();

        // 1 seed + 6 first-level + 2 samples * 2 new links
        assert_eq!(prescan.estimate.sampled_url_count, 11);
        // avg 2 new per sample, 4 unsampled: floor(2 * 4 * 0.7) = 5
        assert_eq!(prescan.estimate.extrapolated_total, 16);
        assert_eq!(prescan.pages.len(), 3);
    }

    #[test]
    fn test_unfetched_prescan_is_empty() {
        let seed = NormalizedUrl::parse_seed("https://example.com/").unwrap();
        let prescan = Prescan::unfetched(seed.clone());
        assert!(prescan.pages.is_empty());
        assert_eq!(prescan.estimate, Estimate::default());
        assert!(prescan.discovered.contains(&seed));
    }

    #[tokio::test]
    async fn test_estimate_fails_when_seed_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let seed = NormalizedUrl::parse_seed(&format!("http://127.0.0.1:{}/", port)).unwrap();
        let result = estimator_for(&seed).estimate(&seed).await;
        assert!(matches!(result, Err(ScanError::EstimationFailed { .. })));
    }

    #[tokio::test]
    async fn test_failed_samples_are_kept_as_failed_pages() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();
        mount_html(&mock_server, "/", format!(r#"<a href="{uri}/gone">gone</a>"#)).await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let seed = NormalizedUrl::parse_seed(&uri).unwrap();
        let prescan = estimator_for(&seed).estimate(&seed).await.unwrap();

        assert_eq!(prescan.estimate.samples_succeeded, 0);
        assert_eq!(prescan.estimate.extrapolated_total, 2);
        assert!(prescan.pages[1].outcome.is_err());
    }
}
