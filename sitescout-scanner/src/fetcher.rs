use crate::error::{FetchError, FetchFailure, Result};
use crate::normalize::NormalizedUrl;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_USER_AGENT: &str = "Sitescout/0.1 (https://github.com/trapdoorsec/sitescout)";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the HTTP transport shared by every component of one session.
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout / 2)
        .pool_max_idle_per_host(50)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()?;
    Ok(client)
}

/// Body of a successful retrieval.
#[derive(Debug, Clone)]
pub struct Content {
    /// Where the body was served from once redirects were followed.
    pub url: NormalizedUrl,
    pub body: String,
    pub content_type: Option<String>,
}

impl Content {
    /// Whether the body is worth parsing for links. A declared HTML type or a
    /// missing type is trusted; anything else is sniffed for a leading tag.
    pub fn looks_like_markup(&self) -> bool {
        match self.content_type.as_deref() {
            None => true,
            Some(ct) if ct.contains("html") => true,
            Some(_) => self.body.trim_start().starts_with('<'),
        }
    }
}

/// Single bounded GET with redirect following. No retries.
#[derive(Clone)]
pub struct PageFetcher {
    client: Client,
    timeout: Duration,
}

impl PageFetcher {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn fetch(&self, url: &NormalizedUrl) -> std::result::Result<Content, FetchError> {
        self.fetch_with_timeout(url, self.timeout).await
    }

    pub async fn fetch_with_timeout(
        &self,
        url: &NormalizedUrl,
        timeout: Duration,
    ) -> std::result::Result<Content, FetchError> {
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url.as_str())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::new(url.as_str(), failure_from(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                url.as_str(),
                FetchFailure::Status(status.as_u16()),
            ));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let served_from =
            NormalizedUrl::from_url(response.url().clone()).unwrap_or_else(|| url.clone());

        let body = response.text().await.map_err(|e| {
            let reason = if e.is_timeout() {
                FetchFailure::Timeout
            } else {
                FetchFailure::Body(e.to_string())
            };
            FetchError::new(url.as_str(), reason)
        })?;

        Ok(Content {
            url: served_from,
            body,
            content_type,
        })
    }
}

fn failure_from(e: &reqwest::Error) -> FetchFailure {
    if e.is_timeout() {
        FetchFailure::Timeout
    } else {
        FetchFailure::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn fetcher(timeout: Duration) -> PageFetcher {
        PageFetcher::new(build_client(DEFAULT_USER_AGENT, timeout).unwrap(), timeout)
    }

    fn url(s: &str) -> NormalizedUrl {
        NormalizedUrl::parse_seed(s).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success_returns_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html>hi</html>", "text/html; charset=utf-8"),
            )
            .mount(&mock_server)
            .await;

        let content = fetcher(Duration::from_secs(5))
            .fetch(&url(&mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(content.body, "<html>hi</html>");
        assert_eq!(content.content_type.as_deref(), Some("text/html; charset=utf-8"));
        assert!(content.looks_like_markup());
    }

    #[tokio::test]
    async fn test_fetch_non_success_status_is_typed_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let err = fetcher(Duration::from_secs(5))
            .fetch(&url(&format!("{}/missing", mock_server.uri())))
            .await
            .unwrap_err();
        assert_eq!(err.reason, FetchFailure::Status(404));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&mock_server)
            .await;

        let err = fetcher(Duration::from_millis(200))
            .fetch(&url(&mock_server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.reason, FetchFailure::Timeout);
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = fetcher(Duration::from_secs(2))
            .fetch(&url(&format!("http://127.0.0.1:{}/", port)))
            .await
            .unwrap_err();
        assert!(matches!(err.reason, FetchFailure::Network(_)));
    }

    #[tokio::test]
    async fn test_fetch_records_url_after_redirect() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();
        Mock::given(method("GET"))
            .and(path("/docs"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("location", format!("{uri}/docs/")),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/docs/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<p>docs</p>", "text/html"))
            .mount(&mock_server)
            .await;

        let content = fetcher(Duration::from_secs(5))
            .fetch(&url(&format!("{uri}/docs")))
            .await
            .unwrap();
        assert_eq!(content.url.path(), "/docs/");
    }

    fn content(content_type: Option<&str>, body: &str) -> Content {
        Content {
            url: url("https://example.com/"),
            body: body.to_string(),
            content_type: content_type.map(str::to_string),
        }
    }

    #[test]
    fn test_markup_detection() {
        assert!(content(Some("text/html"), "").looks_like_markup());
        assert!(content(None, "plain words").looks_like_markup());
        // Misconfigured servers label pages as plain text
        assert!(content(Some("text/plain"), "  <html><a href='/x'>x</a>").looks_like_markup());
        assert!(!content(Some("text/plain"), "just some notes").looks_like_markup());
        assert!(!content(Some("application/pdf"), "%PDF-1.7").looks_like_markup());
    }
}
