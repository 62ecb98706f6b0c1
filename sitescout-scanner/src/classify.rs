// Structural classification of visited URLs

use crate::normalize::{DomainScope, NormalizedUrl, Scope};
use serde::Serialize;
use std::fmt;

/// Report grouping for pages, keyed off the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PageCategory {
    Html,
    Php,
    Pdf,
    Other,
}

impl PageCategory {
    pub fn label(&self) -> &'static str {
        match self {
            PageCategory::Html => "HTML",
            PageCategory::Php => "PHP",
            PageCategory::Pdf => "PDF",
            PageCategory::Other => "Other",
        }
    }
}

impl fmt::Display for PageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Extensions that mark a path as a document rather than a directory.
pub const DOCUMENT_EXTENSIONS: &[(&str, PageCategory)] = &[
    (".html", PageCategory::Html),
    (".htm", PageCategory::Html),
    (".php", PageCategory::Php),
    (".asp", PageCategory::Other),
    (".jsp", PageCategory::Other),
    (".py", PageCategory::Other),
    (".pdf", PageCategory::Pdf),
    (".doc", PageCategory::Other),
];

/// Category of a path segment, or `None` if it is not a known document.
pub fn document_category(segment: &str) -> Option<PageCategory> {
    let segment = segment.to_ascii_lowercase();
    DOCUMENT_EXTENSIONS
        .iter()
        .find(|(ext, _)| segment.ends_with(ext))
        .map(|(_, category)| *category)
}

/// A slash-joined directory path without leading or trailing slashes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Subdirectory {
    pub path: String,
    pub level: usize,
}

impl Subdirectory {
    pub fn from_segments(segments: &[&str]) -> Self {
        Self {
            path: segments.join("/"),
            level: segments.len(),
        }
    }

    pub fn first_segment(&self) -> &str {
        self.path.split('/').next().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlClass {
    Subdomain(String),
    Subdirectory(Subdirectory),
    Page {
        url: NormalizedUrl,
        category: PageCategory,
        parent: Option<Subdirectory>,
    },
}

/// Assign a visited URL to subdomain, subdirectory or page.
///
/// Subdomain URLs are not decomposed further. A page under a directory
/// carries that directory as `parent` so callers can record it too.
pub fn classify(url: &NormalizedUrl, scope: &DomainScope) -> UrlClass {
    if scope.scope(url) == Scope::Subdomain {
        return UrlClass::Subdomain(url.host().to_string());
    }

    let segments = url.segments();
    let Some(last) = segments.last() else {
        return UrlClass::Page {
            url: url.clone(),
            category: PageCategory::Other,
            parent: None,
        };
    };

    match document_category(last) {
        Some(category) => {
            let parent = (segments.len() > 1)
                .then(|| Subdirectory::from_segments(&segments[..segments.len() - 1]));
            UrlClass::Page {
                url: url.clone(),
                category,
                parent,
            }
        }
        None => UrlClass::Subdirectory(Subdirectory::from_segments(&segments)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> DomainScope {
        DomainScope::from_seed(&NormalizedUrl::parse_seed("https://example.com").unwrap())
    }

    fn url(s: &str) -> NormalizedUrl {
        NormalizedUrl::parse_seed(s).unwrap()
    }

    #[test]
    fn test_subdomain_is_terminal() {
        let class = classify(&url("https://api.example.com/v1/users.php"), &scope());
        assert_eq!(class, UrlClass::Subdomain("api.example.com".to_string()));
    }

    #[test]
    fn test_root_is_page() {
        for root in ["https://example.com", "https://example.com/"] {
            match classify(&url(root), &scope()) {
                UrlClass::Page { parent, category, .. } => {
                    assert_eq!(parent, None);
                    assert_eq!(category, PageCategory::Other);
                }
                other => panic!("expected page, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_document_registers_parent_directory() {
        match classify(&url("https://example.com/docs/intro.html"), &scope()) {
            UrlClass::Page { category, parent, .. } => {
                assert_eq!(category, PageCategory::Html);
                assert_eq!(
                    parent,
                    Some(Subdirectory {
                        path: "docs".to_string(),
                        level: 1
                    })
                );
            }
            other => panic!("expected page, got {:?}", other),
        }
    }

    #[test]
    fn test_top_level_document_has_no_parent() {
        match classify(&url("https://example.com/about.PHP"), &scope()) {
            UrlClass::Page { category, parent, .. } => {
                assert_eq!(category, PageCategory::Php);
                assert_eq!(parent, None);
            }
            other => panic!("expected page, got {:?}", other),
        }
    }

    #[test]
    fn test_directory_with_trailing_slash() {
        let class = classify(&url("https://example.com/blog/2024/"), &scope());
        assert_eq!(
            class,
            UrlClass::Subdirectory(Subdirectory {
                path: "blog/2024".to_string(),
                level: 2
            })
        );
    }

    #[test]
    fn test_document_extension_table() {
        assert_eq!(document_category("a.htm"), Some(PageCategory::Html));
        assert_eq!(document_category("paper.pdf"), Some(PageCategory::Pdf));
        assert_eq!(document_category("run.py"), Some(PageCategory::Other));
        assert_eq!(document_category("notes.docx"), None);
        assert_eq!(document_category("archive"), None);
    }

    #[test]
    fn test_first_segment() {
        let dir = Subdirectory::from_segments(&["docs", "api", "v2"]);
        assert_eq!(dir.first_segment(), "docs");
        assert_eq!(dir.level, 3);
    }
}
