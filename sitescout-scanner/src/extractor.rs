use crate::error::{Result, ScanError};
use crate::fetcher::Content;
use crate::normalize::{DomainScope, NormalizedUrl, normalize};
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Extensions of static resources that are never worth a fetch.
pub const ASSET_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".svg", ".ico", ".webp", ".css", ".js", ".xml", ".zip",
    ".tar", ".gz", ".mp4", ".mp3", ".avi", ".woff", ".woff2",
];

/// Collects in-scope links from anchors, `<link>` tags and meta refreshes.
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    scope: DomainScope,
}

impl LinkExtractor {
    pub fn new(scope: DomainScope) -> Self {
        Self { scope }
    }

    pub fn scope(&self) -> &DomainScope {
        &self.scope
    }

    /// Links on a fetched page, resolved against the address it was served
    /// from. Neither that address nor `requested` is returned.
    pub fn links_on(
        &self,
        requested: &NormalizedUrl,
        content: &Content,
    ) -> BTreeSet<NormalizedUrl> {
        if !content.looks_like_markup() {
            return BTreeSet::new();
        }
        let mut links = self.extract_links(&content.url, &content.body);
        links.remove(requested);
        links
    }

    /// Every in-scope link found in `html`, excluding `base` itself.
    ///
    /// Unparseable markup yields an empty set rather than an error.
    pub fn extract_links(&self, base: &NormalizedUrl, html: &str) -> BTreeSet<NormalizedUrl> {
        let mut links = BTreeSet::new();

        let (link_selector, meta_selector) = match link_selectors() {
            Ok(selectors) => selectors,
            Err(e) => {
                warn!("{}, skipping {}", e, base);
                return links;
            }
        };

        let document = Html::parse_document(html);

        let hrefs = document
            .select(&link_selector)
            .filter_map(|element| element.value().attr("href"));

        let refreshes = document
            .select(&meta_selector)
            .filter(|element| {
                element
                    .value()
                    .attr("http-equiv")
                    .is_some_and(|v| v.eq_ignore_ascii_case("refresh"))
            })
            .filter_map(|element| element.value().attr("content"))
            .filter_map(meta_refresh_target);

        for href in hrefs.chain(refreshes) {
            if let Some(link) = self.accept(base, href) {
                links.insert(link);
            }
        }

        debug!("{} in-scope links on {}", links.len(), base);
        links
    }

    fn accept(&self, base: &NormalizedUrl, href: &str) -> Option<NormalizedUrl> {
        let href = href.trim();
        if href.is_empty()
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
            || href.starts_with('#')
        {
            return None;
        }

        let link = normalize(base.as_url(), href)?;
        if !matches!(link.scheme(), "http" | "https") {
            return None;
        }
        if &link == base || is_asset(&link) || !self.scope.in_scope(&link) {
            return None;
        }
        Some(link)
    }
}

fn link_selectors() -> Result<(Selector, Selector)> {
    let parse = |css: &str| {
        Selector::parse(css).map_err(|e| ScanError::ParseFailed(format!("selector {}: {}", css, e)))
    };
    Ok((parse("a[href], link[href]")?, parse("meta[http-equiv][content]")?))
}

/// Target of a `<meta http-equiv="refresh" content="5; url=/next">` tag.
pub fn meta_refresh_target(content: &str) -> Option<&str> {
    let lower = content.to_ascii_lowercase();
    let idx = lower.find("url")?;
    let rest = content[idx + 3..].trim_start().strip_prefix('=')?.trim();
    let target = rest.trim_matches(|c| c == '\'' || c == '"').trim();
    (!target.is_empty()).then_some(target)
}

pub fn is_asset(url: &NormalizedUrl) -> bool {
    let Some(last) = url.segments().last().map(|s| s.to_ascii_lowercase()) else {
        return false;
    };
    ASSET_EXTENSIONS.iter().any(|ext| last.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor_for(seed: &str) -> (LinkExtractor, NormalizedUrl) {
        let seed = NormalizedUrl::parse_seed(seed).unwrap();
        (LinkExtractor::new(DomainScope::from_seed(&seed)), seed)
    }

    fn strs(links: &BTreeSet<NormalizedUrl>) -> Vec<&str> {
        links.iter().map(|l| l.as_str()).collect()
    }

    #[test]
    fn test_extracts_anchor_and_link_tags() {
        let (extractor, base) = extractor_for("https://example.com/");
        let html = r#"<html><head><link rel="alternate" href="/feed/"></head>
            <body><a href="/docs/intro.html">Intro</a>
            <a href="https://api.example.com/">API</a></body></html>"#;

        let links = extractor.extract_links(&base, html);
        assert_eq!(
            strs(&links),
            vec![
                "https://api.example.com/",
                "https://example.com/docs/intro.html",
                "https://example.com/feed/",
            ]
        );
    }

    #[test]
    fn test_filters_foreign_and_self_links() {
        let (extractor, base) = extractor_for("https://example.com/");
        let html = r#"<a href="https://foreign.example.org/x">x</a>
            <a href="/">home</a>
            <a href="https://example.com/#top">top</a>
            <a href="?page=2">page 2</a>"#;

        assert!(extractor.extract_links(&base, html).is_empty());
    }

    #[test]
    fn test_skips_pseudo_schemes_and_assets() {
        let (extractor, base) = extractor_for("https://example.com/");
        let html = r##"<a href="javascript:void(0)">js</a>
            <a href="mailto:a@example.com">mail</a>
            <a href="tel:123">tel</a>
            <a href="#section">frag</a>
            <a href="ftp://example.com/file">ftp</a>
            <link rel="stylesheet" href="/static/site.css">
            <a href="/img/logo.PNG">logo</a>
            <a href="/papers/report.pdf">report</a>"##;

        let links = extractor.extract_links(&base, html);
        assert_eq!(strs(&links), vec!["https://example.com/papers/report.pdf"]);
    }

    #[test]
    fn test_meta_refresh_followed() {
        let (extractor, base) = extractor_for("https://example.com/old/");
        let html = r#"<html><head>
            <meta http-equiv="Refresh" content="0; URL='/new/home.html'">
            </head></html>"#;

        let links = extractor.extract_links(&base, html);
        assert_eq!(strs(&links), vec!["https://example.com/new/home.html"]);
    }

    #[test]
    fn test_meta_refresh_target_parsing() {
        assert_eq!(meta_refresh_target("5; url=/next"), Some("/next"));
        assert_eq!(meta_refresh_target("0;URL=\"https://a.b/\""), Some("https://a.b/"));
        assert_eq!(meta_refresh_target("5"), None);
        assert_eq!(meta_refresh_target("0; url="), None);
    }

    #[test]
    fn test_malformed_markup_degrades_gracefully() {
        let (extractor, base) = extractor_for("https://example.com/");
        let html = "<a href='/ok'>ok<div><<<<a href=/also-ok>>";
        let links = extractor.extract_links(&base, html);
        assert!(links.iter().any(|l| l.path() == "/ok"));

        assert!(extractor.extract_links(&base, "\u{0}\u{1}garbage").is_empty());
    }

    fn served(from: &str, content_type: &str, body: &str) -> Content {
        Content {
            url: NormalizedUrl::parse_seed(from).unwrap(),
            body: body.to_string(),
            content_type: Some(content_type.to_string()),
        }
    }

    #[test]
    fn test_links_on_redirected_page_resolve_against_final_url() {
        let (extractor, _) = extractor_for("https://example.com/");
        let requested = NormalizedUrl::parse_seed("https://example.com/docs").unwrap();
        let page = served(
            "https://example.com/docs/",
            "text/html",
            r#"<a href="intro.html">i</a><a href="/docs">self</a>"#,
        );

        let links = extractor.links_on(&requested, &page);
        assert_eq!(strs(&links), vec!["https://example.com/docs/intro.html"]);
    }

    #[test]
    fn test_links_on_skips_non_markup() {
        let (extractor, base) = extractor_for("https://example.com/");
        let notes = served("https://example.com/", "text/plain", "see /a and /b");
        assert!(extractor.links_on(&base, &notes).is_empty());

        let mislabelled = served("https://example.com/", "text/plain", r#"<a href="/a">a</a>"#);
        let links = extractor.links_on(&base, &mislabelled);
        assert_eq!(strs(&links), vec!["https://example.com/a"]);
    }

    #[test]
    fn test_relative_links_resolve_against_base() {
        let (extractor, _) = extractor_for("https://example.com/");
        let base = NormalizedUrl::parse_seed("https://example.com/docs/guide/").unwrap();
        let links = extractor.extract_links(&base, r#"<a href="../api/index.html">api</a>"#);
        assert_eq!(strs(&links), vec!["https://example.com/docs/api/index.html"]);
    }
}
