// Site map report generation

use crate::topics::{DirectoryTopic, TopLevelDirectory, group_by_topic, top_level_summary};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sitescout_scanner::estimator::{Estimate, Prescan};
use sitescout_scanner::normalize::{DomainScope, NormalizedUrl};
use sitescout_scanner::prober::ProbeReport;
use sitescout_scanner::result::{Classification, CrawlReport};
use sitescout_scanner::{PageCategory, classify};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

pub const DIRECTORIES_SHOWN_PER_LEVEL: usize = 15;
pub const PAGES_SHOWN_PER_CATEGORY: usize = 10;
pub const TOP_LEVEL_DIRECTORIES_SHOWN: usize = 10;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// How a subdomain came to be known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubdomainSource {
    Crawl,
    Probe,
    Both,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubdomainEntry {
    pub host: String,
    pub source: SubdomainSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectoryLevel {
    pub level: usize,
    pub directories: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageGroup {
    pub category: PageCategory,
    pub pages: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicGroup {
    pub topic: DirectoryTopic,
    pub directories: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteReport {
    pub seed: String,
    pub seed_host: String,
    pub registrable_domain: String,
    pub generated_at: DateTime<Utc>,
    /// Built from the prescan alone, nothing crawled past it.
    pub preview: bool,
    pub estimate: Option<Estimate>,
    pub visited_count: usize,
    pub fetch_attempts: usize,
    pub failed_fetches: usize,
    pub pending_remaining: usize,
    pub subdomains: Vec<SubdomainEntry>,
    pub subdirectories: Vec<DirectoryLevel>,
    pub pages: Vec<PageGroup>,
    pub topics: Vec<TopicGroup>,
    pub top_level_directories: Vec<TopLevelDirectory>,
    pub total_unique_locations: usize,
    pub cancelled: bool,
}

impl SiteReport {
    /// Report for a finished (or cancelled) crawl, merged with probe results.
    pub fn from_crawl(
        seed: &NormalizedUrl,
        estimate: Option<Estimate>,
        crawl: &CrawlReport,
        probe: Option<&ProbeReport>,
    ) -> Self {
        let crawled = crawl.classification.subdomains.clone();
        let probed = probe.map(|p| p.confirmed.clone()).unwrap_or_default();

        let mut classification = crawl.classification.clone();
        classification.merge_subdomains(probed.iter().cloned());

        let subdomains = classification
            .subdomains
            .iter()
            .map(|host| SubdomainEntry {
                host: host.clone(),
                source: match (crawled.contains(host), probed.contains(host)) {
                    (true, true) => SubdomainSource::Both,
                    (false, true) => SubdomainSource::Probe,
                    _ => SubdomainSource::Crawl,
                },
            })
            .collect();

        let mut report = Self::skeleton(seed, &crawl.scope, &classification, subdomains);
        report.estimate = estimate;
        report.visited_count = crawl.visited_count();
        report.fetch_attempts = crawl.fetch_attempts();
        report.failed_fetches = crawl.failed_count();
        report.pending_remaining = crawl.pending_remaining;
        report.cancelled = crawl.cancelled || probe.is_some_and(|p| p.cancelled);
        report
    }

    /// Report over everything the prescan discovered, without crawling further.
    pub fn from_prescan(prescan: &Prescan, scope: &DomainScope) -> Self {
        let mut classification = Classification::default();
        for url in &prescan.discovered {
            classification.record(classify(url, scope));
        }

        let subdomains = classification
            .subdomains
            .iter()
            .map(|host| SubdomainEntry {
                host: host.clone(),
                source: SubdomainSource::Crawl,
            })
            .collect();

        let fetched: BTreeSet<&NormalizedUrl> = prescan.pages.iter().map(|p| &p.url).collect();

        let mut report = Self::skeleton(&prescan.seed, scope, &classification, subdomains);
        report.preview = true;
        report.estimate = Some(prescan.estimate);
        report.visited_count = fetched.len();
        report.fetch_attempts = prescan.pages.len();
        report.failed_fetches = prescan.pages.iter().filter(|p| p.outcome.is_err()).count();
        report.pending_remaining = prescan.discovered.len().saturating_sub(fetched.len());
        report
    }

    fn skeleton(
        seed: &NormalizedUrl,
        scope: &DomainScope,
        classification: &Classification,
        subdomains: Vec<SubdomainEntry>,
    ) -> Self {
        let subdirectories = classification
            .subdirectories_by_level()
            .into_iter()
            .map(|(level, dirs)| DirectoryLevel {
                level,
                directories: dirs.into_iter().map(|d| d.path.clone()).collect(),
            })
            .collect();

        let pages = classification
            .pages_by_category()
            .into_iter()
            .map(|(category, urls)| PageGroup {
                category,
                pages: urls.into_iter().map(|u| u.to_string()).collect(),
            })
            .collect();

        let topics = group_by_topic(&classification.subdirectories)
            .into_iter()
            .map(|(topic, directories)| TopicGroup { topic, directories })
            .collect();

        Self {
            seed: seed.to_string(),
            seed_host: scope.seed_host.clone(),
            registrable_domain: scope.registrable_domain.clone(),
            generated_at: Utc::now(),
            preview: false,
            estimate: None,
            visited_count: 0,
            fetch_attempts: 0,
            failed_fetches: 0,
            pending_remaining: 0,
            subdomains,
            subdirectories,
            pages,
            topics,
            top_level_directories: top_level_summary(
                &classification.subdirectories,
                TOP_LEVEL_DIRECTORIES_SHOWN,
            ),
            total_unique_locations: classification.total_unique_locations(),
            cancelled: false,
        }
    }

    pub fn subdirectory_count(&self) -> usize {
        self.subdirectories.iter().map(|l| l.directories.len()).sum()
    }

    pub fn page_count(&self) -> usize {
        self.pages.iter().map(|g| g.pages.len()).sum()
    }
}

fn push_section(report: &mut String, title: &str) {
    report.push_str(RULE);
    report.push('\n');
    report.push_str(title);
    report.push('\n');
    report.push_str(RULE);
    report.push_str("\n\n");
}

fn push_truncated(report: &mut String, items: &[String], limit: usize, indent: &str) {
    for item in items.iter().take(limit) {
        report.push_str(&format!("{}├── {}\n", indent, item));
    }
    if items.len() > limit {
        report.push_str(&format!("{}└── ... and {} more\n", indent, items.len() - limit));
    }
}

pub fn generate_text_report(data: &SiteReport) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push('\n');
    report.push_str("                           SITESCOUT SITE MAP REPORT\n");
    report.push_str(RULE);
    report.push_str("\n\n");

    report.push_str(&format!("Target:        {}\n", data.seed));
    report.push_str(&format!("Host:          {}\n", data.seed_host));
    report.push_str(&format!("Domain:        {}\n", data.registrable_domain));
    report.push_str(&format!(
        "Generated:     {}\n",
        data.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if data.preview {
        report.push_str("Mode:          Preview (prescan only)\n");
    }
    if data.cancelled {
        report.push_str("Status:        Cancelled (partial results)\n");
    }
    report.push('\n');

    push_section(&mut report, "SUMMARY");
    if let Some(estimate) = data.estimate {
        report.push_str(&format!(
            "  Estimated size:      ~{} URLs ({} found during prescan)\n",
            estimate.extrapolated_total, estimate.sampled_url_count
        ));
    }
    report.push_str(&format!("  Pages visited:       {}\n", data.visited_count));
    report.push_str(&format!("  Fetch attempts:      {}\n", data.fetch_attempts));
    report.push_str(&format!("  Failed fetches:      {}\n", data.failed_fetches));
    if data.pending_remaining > 0 {
        report.push_str(&format!("  Left unvisited:      {}\n", data.pending_remaining));
    }
    report.push_str(&format!("  Subdomains:          {}\n", data.subdomains.len()));
    report.push_str(&format!("  Subdirectories:      {}\n", data.subdirectory_count()));
    report.push_str(&format!("  Pages:               {}\n", data.page_count()));
    report.push_str(&format!(
        "  Unique locations:    {}\n\n",
        data.total_unique_locations
    ));

    push_section(&mut report, &format!("SUBDOMAINS ({})", data.subdomains.len()));
    if data.subdomains.is_empty() {
        report.push_str("  None found\n");
    }
    for entry in &data.subdomains {
        let source = match entry.source {
            SubdomainSource::Crawl => "crawl",
            SubdomainSource::Probe => "dns probe",
            SubdomainSource::Both => "crawl + dns probe",
        };
        report.push_str(&format!("  ├── https://{}  [{}]\n", entry.host, source));
    }
    report.push('\n');

    push_section(
        &mut report,
        &format!("SUBDIRECTORIES ({})", data.subdirectory_count()),
    );
    if data.subdirectories.is_empty() {
        report.push_str("  None found\n");
    }
    for level in &data.subdirectories {
        report.push_str(&format!(
            "  Level {} ({}):\n",
            level.level,
            level.directories.len()
        ));
        let paths: Vec<String> = level.directories.iter().map(|d| format!("/{}/", d)).collect();
        push_truncated(&mut report, &paths, DIRECTORIES_SHOWN_PER_LEVEL, "    ");
    }
    report.push('\n');

    if !data.topics.is_empty() {
        push_section(&mut report, "DIRECTORY TOPICS");
        for group in &data.topics {
            report.push_str(&format!(
                "  {} ({})\n",
                group.topic.label().to_uppercase(),
                group.directories.len()
            ));
        }
        report.push('\n');
    }

    push_section(&mut report, &format!("PAGES ({})", data.page_count()));
    if data.pages.is_empty() {
        report.push_str("  None found\n");
    }
    for group in &data.pages {
        report.push_str(&format!(
            "  {} ({}):\n",
            group.category.label(),
            group.pages.len()
        ));
        push_truncated(&mut report, &group.pages, PAGES_SHOWN_PER_CATEGORY, "    ");
    }
    report.push('\n');

    if !data.top_level_directories.is_empty() {
        push_section(&mut report, "TOP-LEVEL DIRECTORIES");
        for dir in &data.top_level_directories {
            report.push_str(&format!("  /{}/  {} subdirectories\n", dir.name, dir.count));
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push('\n');
    report.push_str("                                 End of Report\n");
    report.push_str(RULE);
    report.push('\n');

    report
}

pub fn generate_json_report(data: &SiteReport) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Sitescout",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": data.generated_at.to_rfc3339(),
                "format": "json"
            },
            "site": data
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn render_report(data: &SiteReport, format: ReportFormat) -> Result<String, String> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(data)),
        ReportFormat::Json => generate_json_report(data)
            .map_err(|e| format!("Failed to serialise report: {}", e)),
    }
}

/// Write a rendered report, expanding `~` and creating parent directories.
pub fn save_report(content: &str, path: &str) -> Result<PathBuf, String> {
    let expanded = shellexpand::tilde(path);
    let path = PathBuf::from(expanded.as_ref());

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
    }

    fs::write(&path, content)
        .map_err(|e| format!("Failed to write report to {}: {}", path.display(), e))?;
    Ok(path)
}
