// URL canonicalisation and same-site scope decisions

use crate::error::{Result, ScanError};
use serde::{Serialize, Serializer};
use std::fmt;
use url::{Host, Url};

/// An absolute URL reduced to the parts that identify a location.
///
/// Query strings, fragments and credentials are dropped, so two hrefs that
/// only differ in those parts compare equal. Ordering follows the serialized
/// form, which is what the latest-first queue relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedUrl(Url);

impl NormalizedUrl {
    /// Reduce an already absolute URL. Returns `None` when there is no host.
    pub fn from_url(mut url: Url) -> Option<Self> {
        if url.cannot_be_a_base() || url.host_str().is_none_or(str::is_empty) {
            return None;
        }
        url.set_query(None);
        url.set_fragment(None);
        // Both only fail for URLs without a host, excluded above
        let _ = url.set_username("");
        let _ = url.set_password(None);
        Some(Self(url))
    }

    /// Parse a seed given on the command line, defaulting the scheme to https.
    pub fn parse_seed(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let with_scheme = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("https://{}", raw)
        };

        let url = Url::parse(&with_scheme)
            .map_err(|e| ScanError::MalformedUrl(format!("{}: {}", raw, e)))?;
        Self::from_url(url).ok_or_else(|| ScanError::MalformedUrl(format!("{}: no host", raw)))
    }

    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.0.path()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Non-empty path segments, e.g. `["docs", "intro.html"]` for `/docs/intro.html`.
    pub fn segments(&self) -> Vec<&str> {
        self.path().split('/').filter(|s| !s.is_empty()).collect()
    }

    pub fn is_ip(&self) -> bool {
        matches!(self.0.host(), Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)))
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NormalizedUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Resolve `href` against `base` and reduce it to a [`NormalizedUrl`].
///
/// Returns `None` for anything that does not resolve to a URL with a host.
pub fn normalize(base: &Url, href: &str) -> Option<NormalizedUrl> {
    let resolved = base.join(href.trim()).ok()?;
    NormalizedUrl::from_url(resolved)
}

/// Where a URL sits relative to the crawl seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Scope {
    SameHost,
    Subdomain,
    Foreign,
}

/// The seed host plus its registrable domain (the last two labels).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainScope {
    pub seed_host: String,
    pub registrable_domain: String,
}

impl DomainScope {
    pub fn from_seed(seed: &NormalizedUrl) -> Self {
        let seed_host = seed.host().to_string();
        let registrable_domain = if seed.is_ip() {
            seed_host.clone()
        } else {
            registrable_domain(&seed_host)
        };

        Self {
            seed_host,
            registrable_domain,
        }
    }

    pub fn scope(&self, url: &NormalizedUrl) -> Scope {
        let host = url.host();
        if host == self.seed_host {
            return Scope::SameHost;
        }
        if url.is_ip() {
            return Scope::Foreign;
        }
        if host == self.registrable_domain
            || host.ends_with(&format!(".{}", self.registrable_domain))
        {
            Scope::Subdomain
        } else {
            Scope::Foreign
        }
    }

    pub fn in_scope(&self, url: &NormalizedUrl) -> bool {
        self.scope(url) != Scope::Foreign
    }
}

/// Last two dot-separated labels of a hostname.
pub fn registrable_domain(host: &str) -> String {
    let host = host.trim_end_matches('.');
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() >= 2 {
        labels[labels.len() - 2..].join(".")
    } else {
        host.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_normalize_strips_query_and_fragment() {
        let url = normalize(&base("https://example.com/docs/"), "intro.html?x=1#top").unwrap();
        assert_eq!(url.as_str(), "https://example.com/docs/intro.html");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let b = base("https://example.com/a/b/");
        for href in ["../c?q=1", "/x#frag", "https://docs.example.com/y/?z", "d/e.html"] {
            let once = normalize(&b, href).unwrap();
            let twice = normalize(&b, once.as_str()).unwrap();
            assert_eq!(once, twice);
            assert!(!twice.as_str().contains('?'));
            assert!(!twice.as_str().contains('#'));
        }
    }

    #[test]
    fn test_normalize_rejects_hostless() {
        let b = base("https://example.com/");
        assert!(normalize(&b, "mailto:someone@example.com").is_none());
        assert!(normalize(&b, "javascript:void(0)").is_none());
        assert!(normalize(&b, "data:text/plain,hi").is_none());
    }

    #[test]
    fn test_normalize_drops_credentials() {
        let url = normalize(&base("https://example.com/"), "https://user:pw@example.com/a").unwrap();
        assert_eq!(url.as_str(), "https://example.com/a");
    }

    #[test]
    fn test_parse_seed_defaults_to_https() {
        let seed = NormalizedUrl::parse_seed("example.com").unwrap();
        assert_eq!(seed.scheme(), "https");
        assert_eq!(seed.host(), "example.com");
        assert_eq!(seed.path(), "/");
    }

    #[test]
    fn test_parse_seed_keeps_explicit_scheme() {
        let seed = NormalizedUrl::parse_seed("http://example.com/blog?page=2").unwrap();
        assert_eq!(seed.as_str(), "http://example.com/blog");
    }

    #[test]
    fn test_parse_seed_invalid() {
        assert!(NormalizedUrl::parse_seed("http://").is_err());
    }

    #[test]
    fn test_registrable_domain() {
        assert_eq!(registrable_domain("docs.example.com"), "example.com");
        assert_eq!(registrable_domain("a.b.example.com"), "example.com");
        assert_eq!(registrable_domain("example.com"), "example.com");
        assert_eq!(registrable_domain("localhost"), "localhost");
    }

    #[test]
    fn test_scope_classification() {
        let seed = NormalizedUrl::parse_seed("https://docs.example.com").unwrap();
        let scope = DomainScope::from_seed(&seed);
        assert_eq!(scope.registrable_domain, "example.com");

        let same = NormalizedUrl::parse_seed("https://docs.example.com/x").unwrap();
        let sub = NormalizedUrl::parse_seed("https://api.example.com/").unwrap();
        let apex = NormalizedUrl::parse_seed("https://example.com/").unwrap();
        let foreign = NormalizedUrl::parse_seed("https://foreign.example.org/").unwrap();
        let lookalike = NormalizedUrl::parse_seed("https://notexample.com/").unwrap();

        assert_eq!(scope.scope(&same), Scope::SameHost);
        assert_eq!(scope.scope(&sub), Scope::Subdomain);
        assert_eq!(scope.scope(&apex), Scope::Subdomain);
        assert_eq!(scope.scope(&foreign), Scope::Foreign);
        assert_eq!(scope.scope(&lookalike), Scope::Foreign);
    }

    #[test]
    fn test_scope_ip_seed() {
        let seed = NormalizedUrl::parse_seed("http://127.0.0.1:8080/").unwrap();
        let scope = DomainScope::from_seed(&seed);
        assert_eq!(scope.registrable_domain, "127.0.0.1");

        let other_port = NormalizedUrl::parse_seed("http://127.0.0.1:9090/a").unwrap();
        let other_ip = NormalizedUrl::parse_seed("http://10.0.0.1/").unwrap();
        assert_eq!(scope.scope(&other_port), Scope::SameHost);
        assert_eq!(scope.scope(&other_ip), Scope::Foreign);
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let a = NormalizedUrl::parse_seed("https://example.com/2023/post").unwrap();
        let b = NormalizedUrl::parse_seed("https://example.com/2024/post").unwrap();
        assert!(b > a);
    }
}
