use crate::classify::{PageCategory, Subdirectory, UrlClass, document_category};
use crate::normalize::{DomainScope, NormalizedUrl};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// One entry in the fetch-attempt log.
#[derive(Debug, Clone, Serialize)]
pub struct FetchRecord {
    pub url: NormalizedUrl,
    pub depth: usize,
    pub response_time: Duration,
    pub links_found: usize,
    pub error: Option<String>,
}

impl FetchRecord {
    pub fn new(url: NormalizedUrl, depth: usize) -> Self {
        Self {
            url,
            depth,
            response_time: Duration::from_secs(0),
            links_found: 0,
            error: None,
        }
    }

    pub fn with_error(url: NormalizedUrl, depth: usize, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(url, depth)
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Subdomains, subdirectories and pages discovered so far.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Classification {
    pub subdomains: BTreeSet<String>,
    pub subdirectories: BTreeSet<Subdirectory>,
    pub pages: BTreeSet<NormalizedUrl>,
}

impl Classification {
    pub fn record(&mut self, class: UrlClass) {
        match class {
            UrlClass::Subdomain(host) => {
                self.subdomains.insert(host);
            }
            UrlClass::Subdirectory(dir) => {
                self.subdirectories.insert(dir);
            }
            UrlClass::Page { url, parent, .. } => {
                if let Some(dir) = parent {
                    self.subdirectories.insert(dir);
                }
                self.pages.insert(url);
            }
        }
    }

    pub fn merge_subdomains<I: IntoIterator<Item = String>>(&mut self, hosts: I) {
        self.subdomains.extend(hosts);
    }

    pub fn subdirectories_by_level(&self) -> BTreeMap<usize, Vec<&Subdirectory>> {
        let mut by_level: BTreeMap<usize, Vec<&Subdirectory>> = BTreeMap::new();
        for dir in &self.subdirectories {
            by_level.entry(dir.level).or_default().push(dir);
        }
        by_level
    }

    pub fn pages_by_category(&self) -> BTreeMap<PageCategory, Vec<&NormalizedUrl>> {
        let mut by_category: BTreeMap<PageCategory, Vec<&NormalizedUrl>> = BTreeMap::new();
        for page in &self.pages {
            let category = page
                .segments()
                .last()
                .and_then(|s| document_category(s))
                .unwrap_or(PageCategory::Other);
            by_category.entry(category).or_default().push(page);
        }
        by_category
    }

    pub fn total_unique_locations(&self) -> usize {
        self.subdomains.len() + self.subdirectories.len() + self.pages.len()
    }
}

/// Everything one crawl session produced. Valid even when cut short.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub scope: DomainScope,
    pub classification: Classification,
    pub visited: BTreeSet<NormalizedUrl>,
    pub fetch_log: Vec<FetchRecord>,
    pub pending_remaining: usize,
    pub cancelled: bool,
}

impl CrawlReport {
    pub fn fetch_attempts(&self) -> usize {
        self.fetch_log.len()
    }

    pub fn failed_count(&self) -> usize {
        self.fetch_log.iter().filter(|r| !r.succeeded()).count()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}
