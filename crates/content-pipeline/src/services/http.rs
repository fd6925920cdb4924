//! HTTP fetch capability shared by discoverers and resolvers

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::{ContentError, PipelineConfig, Result};

/// Extra request headers as name/value pairs
pub type RequestHeaders = Vec<(String, String)>;

/// Fetches documents over HTTP
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// GET `url` and return the body as text; non-success statuses are errors
    async fn fetch_text(&self, url: &str, headers: &[(String, String)], cancel: &CancellationToken) -> Result<String>;
}

/// GET `url` and deserialize the JSON body
pub async fn fetch_json<T: DeserializeOwned>(
    fetcher: &dyn HttpFetcher,
    url: &str,
    headers: &[(String, String)],
    cancel: &CancellationToken,
) -> Result<T> {
    let body = fetcher.fetch_text(url, headers, cancel).await?;
    serde_json::from_str(&body).map_err(|source| ContentError::Json {
        context: url.to_string(),
        source,
    })
}

/// Race `future` against the token
pub async fn with_cancellation<T, F>(cancel: &CancellationToken, operation: &str, future: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ContentError::cancelled(operation)),
        result = future => result,
    }
}

/// [`HttpFetcher`] backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| ContentError::Configuration {
                message: format!("failed to create HTTP client: {}", e),
                field: None,
                suggestion: None,
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch_text(&self, url: &str, headers: &[(String, String)], cancel: &CancellationToken) -> Result<String> {
        debug!("Fetching {}", url);
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        with_cancellation(cancel, &format!("fetch {}", url), async {
            let response = request.send().await.map_err(|source| classify_reqwest_error(url, source))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ContentError::HttpStatus {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            response.text().await.map_err(|source| classify_reqwest_error(url, source))
        })
        .await
    }
}

/// Keep the requested URL in the error even when reqwest has none
pub fn classify_reqwest_error(url: &str, source: reqwest::Error) -> ContentError {
    if source.is_timeout() {
        ContentError::NetworkTimeout {
            url: url.to_string(),
            duration_secs: 0,
        }
    } else {
        ContentError::HttpRequest {
            url: url.to_string(),
            source,
        }
    }
}
