use std::future::Future;
use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("no page at {0}")]
    NotFound(String),
}

/// Source of page HTML. The HTTP client implements it for live runs; tests
/// substitute canned pages.
pub trait Fetch {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, FetchError>>;
}

impl<F: Fetch> Fetch for &F {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> {
        (**self).fetch(url)
    }
}

/// Plain GET with no retry: any failure is returned to the caller.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let http = |source: reqwest::Error| FetchError::Http {
            url: url.to_string(),
            source,
        };

        let start = Instant::now();
        let response = self.client.get(url).send().await.map_err(http)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await.map_err(http)?;
        debug!(
            url,
            bytes = body.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(body)
    }
}
