use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Malformed URL: {0}")]
    MalformedUrl(String),

    #[error("Fetch failed: {0}")]
    FetchFailed(#[from] FetchError),

    #[error("Parse error: {0}")]
    ParseFailed(String),

    #[error("Estimation failed: seed {seed} unreachable ({reason})")]
    EstimationFailed { seed: String, reason: String },

    #[error("Probe failed for {host}: {reason}")]
    ProbeFailed { host: String, reason: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Why a single page retrieval did not produce content.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    #[error("status {0}")]
    Status(u16),

    #[error("timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("unreadable body: {0}")]
    Body(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{url}: {reason}")]
pub struct FetchError {
    pub url: String,
    pub reason: FetchFailure,
}

impl FetchError {
    pub fn new(url: impl Into<String>, reason: FetchFailure) -> Self {
        Self {
            url: url.into(),
            reason,
        }
    }
}
