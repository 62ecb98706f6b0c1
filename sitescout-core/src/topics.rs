// Topic grouping of discovered directories

use regex::Regex;
use serde::Serialize;
use sitescout_scanner::Subdirectory;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DirectoryTopic {
    Documentation,
    Versions,
    Content,
    Navigation,
    Legal,
    Language,
    Other,
}

impl DirectoryTopic {
    pub fn label(&self) -> &'static str {
        match self {
            DirectoryTopic::Documentation => "Documentation",
            DirectoryTopic::Versions => "Versions",
            DirectoryTopic::Content => "Content",
            DirectoryTopic::Navigation => "Navigation",
            DirectoryTopic::Legal => "Legal",
            DirectoryTopic::Language => "Language",
            DirectoryTopic::Other => "Other",
        }
    }
}

impl fmt::Display for DirectoryTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// Checked in order, first match wins
static TOPIC_PATTERNS: LazyLock<Vec<(DirectoryTopic, Regex)>> = LazyLock::new(|| {
    vec![
        (
            DirectoryTopic::Documentation,
            Regex::new(r"(?i)tutorial|guide|docs|help|faq|reference|manual").unwrap(),
        ),
        (
            DirectoryTopic::Versions,
            Regex::new(r"(?i)\d+\.\d+|v\d+|latest|stable|beta|alpha").unwrap(),
        ),
        (
            DirectoryTopic::Content,
            Regex::new(r"(?i)library|howto|extending|distributing|installing").unwrap(),
        ),
        (
            DirectoryTopic::Navigation,
            Regex::new(r"(?i)index|contents|genindex|search|modindex").unwrap(),
        ),
        (
            DirectoryTopic::Legal,
            Regex::new(r"(?i)license|copyright|bugs|download").unwrap(),
        ),
        (
            DirectoryTopic::Language,
            Regex::new(r"(?i)(^|/)(en|es|fr|de|it|ru|cn|jp|kr)(/|$)").unwrap(),
        ),
    ]
});

pub fn topic_of(path: &str) -> DirectoryTopic {
    TOPIC_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(path))
        .map(|(topic, _)| *topic)
        .unwrap_or(DirectoryTopic::Other)
}

/// Group directory paths by topic. Paths within a topic stay sorted.
pub fn group_by_topic<'a, I>(dirs: I) -> BTreeMap<DirectoryTopic, Vec<String>>
where
    I: IntoIterator<Item = &'a Subdirectory>,
{
    let mut grouped: BTreeMap<DirectoryTopic, Vec<String>> = BTreeMap::new();
    for dir in dirs {
        grouped
            .entry(topic_of(&dir.path))
            .or_default()
            .push(dir.path.clone());
    }
    for paths in grouped.values_mut() {
        paths.sort();
    }
    grouped
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopLevelDirectory {
    pub name: String,
    pub count: usize,
}

/// Directories counted under their first path segment, busiest first.
pub fn top_level_summary<'a, I>(dirs: I, limit: usize) -> Vec<TopLevelDirectory>
where
    I: IntoIterator<Item = &'a Subdirectory>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for dir in dirs {
        *counts.entry(dir.first_segment()).or_insert(0) += 1;
    }

    let mut summary: Vec<TopLevelDirectory> = counts
        .into_iter()
        .map(|(name, count)| TopLevelDirectory {
            name: name.to_string(),
            count,
        })
        .collect();
    summary.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    summary.truncate(limit);
    summary
}
