// DNS + HTTP liveness probing of common subdomain labels

use crate::error::{Result, ScanError};
use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Labels tried against the registrable domain.
pub const CANDIDATE_LABELS: &[&str] = &[
    "www", "mail", "ftp", "blog", "shop", "store", "news", "support", "help", "forum", "api",
    "docs", "cdn", "static", "images", "img", "media", "admin", "login", "secure", "app",
    "mobile", "m", "test", "dev", "staging", "demo", "portal", "client", "customer", "member",
    "user", "status", "beta", "alpha", "v2", "download", "files", "bugs", "issues", "wiki",
    "community", "learn", "tutorial", "guide",
];

pub const DEFAULT_PROBE_WORKERS: usize = 10;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5_000;

/// A-record lookup, swappable so probing can run without real DNS.
pub trait Resolver: Send + Sync {
    fn resolve_a<'a>(&'a self, host: &'a str) -> BoxFuture<'a, std::io::Result<Vec<Ipv4Addr>>>;
}

/// Resolves through the operating system's resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn resolve_a<'a>(&'a self, host: &'a str) -> BoxFuture<'a, std::io::Result<Vec<Ipv4Addr>>> {
        Box::pin(async move {
            let addrs = tokio::net::lookup_host((host, 80)).await?;
            Ok(addrs
                .filter_map(|addr| match addr.ip() {
                    IpAddr::V4(v4) => Some(v4),
                    IpAddr::V6(_) => None,
                })
                .collect())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub workers: usize,
    /// Bound on each DNS lookup and each liveness request.
    pub timeout_ms: u64,
    pub labels: Vec<String>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_PROBE_WORKERS,
            timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            labels: CANDIDATE_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl ProbeConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProbeReport {
    pub confirmed: BTreeSet<String>,
    pub candidates: usize,
    pub failed: usize,
    pub cancelled: bool,
}

pub struct SubdomainProber {
    client: Client,
    resolver: Arc<dyn Resolver>,
    config: ProbeConfig,
    cancel: CancellationToken,
}

impl SubdomainProber {
    pub fn new(client: Client, config: ProbeConfig) -> Self {
        Self {
            client,
            resolver: Arc::new(SystemResolver),
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Probe every candidate label under `registrable_domain`.
    ///
    /// Failures only exclude the candidate concerned.
    pub async fn probe(&self, registrable_domain: &str) -> ProbeReport {
        let hosts: Vec<String> = self
            .config
            .labels
            .iter()
            .map(|label| format!("{}.{}", label, registrable_domain))
            .collect();

        info!(
            "Probing {} subdomain candidates of {} with {} workers",
            hosts.len(),
            registrable_domain,
            self.config.workers
        );

        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut tasks = Vec::with_capacity(hosts.len());

        for host in hosts.iter().cloned() {
            let client = self.client.clone();
            let resolver = self.resolver.clone();
            let semaphore = semaphore.clone();
            let cancel = self.cancel.clone();
            let timeout = self.config.timeout();

            tasks.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| probe_failed(&host, e.to_string()))?;

                tokio::select! {
                    _ = cancel.cancelled() => Err(probe_failed(&host, "cancelled")),
                    result = check_candidate(&client, resolver.as_ref(), &host, timeout) => result,
                }
            }));
        }

        let mut report = ProbeReport {
            candidates: hosts.len(),
            ..ProbeReport::default()
        };

        for task in tasks {
            match task.await {
                Ok(Ok(host)) => {
                    info!("Found subdomain: {}", host);
                    report.confirmed.insert(host);
                }
                Ok(Err(e)) => {
                    debug!("{}", e);
                    report.failed += 1;
                }
                Err(e) => {
                    warn!("{}", ScanError::Join(e));
                    report.failed += 1;
                }
            }
        }

        report.cancelled = self.cancel.is_cancelled();
        info!(
            "Subdomain probing done: {} confirmed of {}",
            report.confirmed.len(),
            report.candidates
        );
        report
    }
}

/// DNS A lookup followed by HEAD over https then http.
pub async fn check_candidate(
    client: &Client,
    resolver: &dyn Resolver,
    host: &str,
    timeout: Duration,
) -> Result<String> {
    let addrs = tokio::time::timeout(timeout, resolver.resolve_a(host))
        .await
        .map_err(|_| probe_failed(host, "DNS lookup timed out"))?
        .map_err(|e| probe_failed(host, format!("DNS lookup failed: {}", e)))?;

    if addrs.is_empty() {
        return Err(probe_failed(host, "no A records"));
    }

    for scheme in ["https", "http"] {
        let url = format!("{}://{}", scheme, host);
        match client.head(&url).timeout(timeout).send().await {
            Ok(response) if response.status().as_u16() < 400 => return Ok(host.to_string()),
            Ok(response) => debug!("{} answered {}", url, response.status()),
            Err(e) => debug!("{} unreachable: {}", url, e),
        }
    }

    Err(probe_failed(host, "no live HTTP endpoint"))
}

fn probe_failed(host: &str, reason: impl Into<String>) -> ScanError {
    ScanError::ProbeFailed {
        host: host.to_string(),
        reason: reason.into(),
    }
}
