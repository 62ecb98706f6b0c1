pub mod classify;
pub mod crawler;
pub mod error;
pub mod estimator;
pub mod extractor;
pub mod fetcher;
pub mod frontier;
pub mod normalize;
pub mod prober;
pub mod result;

pub use classify::{PageCategory, Subdirectory, UrlClass, classify};
pub use crawler::{CrawlConfig, CrawlProgress, Crawler, ProgressCallback};
pub use error::{FetchError, FetchFailure, ScanError};
pub use estimator::{Estimate, EstimatorConfig, Prescan, SizeEstimator};
pub use extractor::LinkExtractor;
pub use fetcher::{PageFetcher, build_client};
pub use frontier::{Frontier, QueueOrder};
pub use normalize::{DomainScope, NormalizedUrl, Scope};
pub use prober::{ProbeConfig, ProbeReport, Resolver, SubdomainProber, SystemResolver};
pub use result::{Classification, CrawlReport, FetchRecord};
