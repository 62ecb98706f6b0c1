use crate::report::SiteReport;
use indicatif::{ProgressBar, ProgressStyle};
use sitescout_scanner::crawler::{CrawlConfig, CrawlProgress, Crawler, ProgressCallback};
use sitescout_scanner::error::ScanError;
use sitescout_scanner::estimator::{Estimate, EstimatorConfig, Prescan, SizeEstimator};
use sitescout_scanner::extractor::LinkExtractor;
use sitescout_scanner::fetcher::{PageFetcher, build_client};
use sitescout_scanner::normalize::{DomainScope, NormalizedUrl};
use sitescout_scanner::prober::{ProbeConfig, SubdomainProber};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Options for one mapping session
pub struct SessionOptions {
    pub seed: NormalizedUrl,
    pub crawl: CrawlConfig,
    /// `None` skips DNS probing.
    pub probe: Option<ProbeConfig>,
    pub estimator: EstimatorConfig,
    pub show_progress: bool,
}

impl SessionOptions {
    pub fn new(seed: NormalizedUrl) -> Self {
        Self {
            seed,
            crawl: CrawlConfig::default(),
            probe: Some(ProbeConfig::default()),
            estimator: EstimatorConfig::default(),
            show_progress: false,
        }
    }
}

/// What to do once the prescan estimate is known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    PreviewOnly,
    Abort,
}

#[derive(Debug)]
pub enum SessionOutcome {
    Completed(SiteReport),
    Preview(SiteReport),
    Aborted(Estimate),
}

fn spinner(enabled: bool, message: &'static str) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message);
    pb
}

/// Prescan the seed, ask `decide` whether to go on, then probe and crawl
/// concurrently. Only an unreachable seed is an error; a cancelled session
/// still yields a report.
pub async fn execute_session<F>(
    options: SessionOptions,
    cancel: CancellationToken,
    decide: F,
) -> Result<SessionOutcome, ScanError>
where
    F: FnOnce(&Prescan) -> Decision,
{
    let SessionOptions {
        seed,
        crawl,
        probe,
        estimator,
        show_progress,
    } = options;

    let client = build_client(&crawl.user_agent, crawl.fetch_timeout())?;
    let fetcher = PageFetcher::new(client.clone(), crawl.fetch_timeout());
    let scope = DomainScope::from_seed(&seed);

    let prescan = if crawl.max_pages == 0 {
        info!("Page budget is zero, skipping prescan");
        Prescan::unfetched(seed.clone())
    } else {
        // Prescan fetches come out of the crawl budget: the seed plus samples
        let sample_size = estimator.sample_size.min(crawl.max_pages - 1);
        let progress_bar = spinner(show_progress, "Estimating site size...");
        let prescan = SizeEstimator::new(fetcher.clone(), LinkExtractor::new(scope.clone()))
            .with_config(&estimator)
            .with_sample_size(sample_size)
            .estimate(&seed)
            .await;
        progress_bar.finish_and_clear();
        prescan?
    };

    match decide(&prescan) {
        Decision::Abort => {
            info!("Session aborted after prescan");
            return Ok(SessionOutcome::Aborted(prescan.estimate));
        }
        Decision::PreviewOnly => {
            return Ok(SessionOutcome::Preview(SiteReport::from_prescan(
                &prescan, &scope,
            )));
        }
        Decision::Proceed => {}
    }

    let progress_bar = Arc::new(spinner(show_progress, "Starting crawl..."));
    let pb = progress_bar.clone();
    let progress_callback: ProgressCallback = Arc::new(move |p: CrawlProgress| {
        pb.set_message(format!(
            "Crawling... {}/{} fetched, {} pending | {}",
            p.attempts, p.max_pages, p.pending, p.url
        ));
    });

    let crawler = Crawler::new(fetcher, scope.clone(), crawl)
        .with_progress_callback(progress_callback)
        .with_cancellation(cancel.clone());

    // Probing an address literal's "subdomains" is meaningless
    let prober = match probe {
        Some(config) if !seed.is_ip() => Some(
            SubdomainProber::new(client, config).with_cancellation(cancel.clone()),
        ),
        Some(_) => {
            info!("Seed host is an IP address, skipping subdomain probing");
            None
        }
        None => None,
    };

    let probe_future = async {
        match &prober {
            Some(prober) => Some(prober.probe(&scope.registrable_domain).await),
            None => None,
        }
    };

    let (crawl_report, probe_report) =
        tokio::join!(crawler.crawl_from_prescan(&prescan), probe_future);

    progress_bar.finish_with_message(format!(
        "Crawl complete! {} pages fetched",
        crawl_report.fetch_attempts()
    ));

    Ok(SessionOutcome::Completed(SiteReport::from_crawl(
        &seed,
        Some(prescan.estimate),
        &crawl_report,
        probe_report.as_ref(),
    )))
}
