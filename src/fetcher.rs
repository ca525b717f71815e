use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rand::{seq::SliceRandom, thread_rng};
use reqwest::{header, Client, StatusCode};
use thiserror::Error;
use url::Url;

const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:122.0) Gecko/20100101 Firefox/122.0",
];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url {0}")]
    InvalidUrl(String),
    #[error("http status {0} for {1}")]
    Status(StatusCode, Url),
    #[error("reqwest error: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub final_url: Url,
    pub status: StatusCode,
    pub body: Bytes,
}

/// The fetch side of a crawl. Tasks only ever see this trait, so tests swap
/// the HTTP client for an in-memory site.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError>;
}

#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    user_agents: Vec<String>,
}

impl Fetcher {
    pub fn new(user_agents: Option<Vec<String>>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENTS[0])
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(Duration::from_secs(20))
            .tcp_nodelay(true)
            .tcp_keepalive(Duration::from_secs(30))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            user_agents: user_agents.unwrap_or_else(|| {
                DEFAULT_USER_AGENTS
                    .iter()
                    .map(|ua| ua.to_string())
                    .collect()
            }),
        })
    }

    fn pick_user_agent(&self) -> &str {
        let mut rng = thread_rng();
        self.user_agents
            .choose(&mut rng)
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_USER_AGENTS[0])
    }
}

#[async_trait]
impl PageFetcher for Fetcher {
    // One attempt per URL; a failed URL is simply never recorded, so there is
    // nothing to retry within a run.
    async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        let resp = self
            .client
            .get(parsed)
            .header(header::USER_AGENT, self.pick_user_agent())
            .header(
                header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status, resp.url().clone()));
        }

        let final_url = resp.url().clone();
        let body = resp.bytes().await?;
        Ok(FetchResult {
            final_url,
            status,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>hi</html>"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(None).expect("client should build");
        let result = fetcher
            .fetch(&format!("{}/page", server.uri()))
            .await
            .expect("fetch should succeed");

        assert_eq!(result.status, StatusCode::OK);
        assert_eq!(result.body.as_ref(), b"<html>hi</html>");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(None).expect("client should build");
        let err = fetcher
            .fetch(&format!("{}/missing", server.uri()))
            .await
            .expect_err("404 should be an error");

        assert!(matches!(err, FetchError::Status(status, _) if status == StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn unparseable_url_is_rejected_without_a_request() {
        let fetcher = Fetcher::new(None).expect("client should build");
        let err = fetcher
            .fetch("relative.html")
            .await
            .expect_err("bare relative path is not fetchable");

        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }
}
