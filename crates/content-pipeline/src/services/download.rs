//! Streaming file downloads with retry and optional hash verification

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::{ContentError, FileOperation, PipelineConfig, Result};
use crate::services::hash::{FileHashProvider, XxHashFileHashProvider};
use crate::services::http::classify_reqwest_error;

/// Byte-level progress: `(downloaded, total)`
pub type DownloadProgressCallback = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Downloads one URL to one destination path
#[async_trait]
pub trait DownloadService: Send + Sync {
    /// Download `url` to `destination`, returning the number of bytes written
    ///
    /// When `expected_hash` is given the file is hashed after download and a
    /// mismatch is reported as [`ContentError::HashMismatch`].
    async fn download_file(
        &self,
        url: &str,
        destination: &Path,
        expected_hash: Option<&str>,
        progress: Option<DownloadProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<u64>;
}

/// [`DownloadService`] over reqwest with exponential backoff between attempts
pub struct HttpDownloadService {
    client: Client,
    retries: usize,
    retry_delay: Duration,
    hasher: Arc<dyn FileHashProvider>,
}

impl std::fmt::Debug for HttpDownloadService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDownloadService")
            .field("retries", &self.retries)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

impl HttpDownloadService {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.http_timeout)
            .build()
            .map_err(|e| ContentError::configuration(format!("failed to create download client: {}", e)))?;

        Ok(Self {
            client,
            retries: config.download_retries,
            retry_delay: config.retry_delay,
            hasher: Arc::new(XxHashFileHashProvider::new()),
        })
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn FileHashProvider>) -> Self {
        self.hasher = hasher;
        self
    }

    fn retry_strategy(&self) -> std::iter::Take<ExponentialBackoff> {
        // Delays of retry_delay, 2x, 4x, ...
        let factor = (self.retry_delay.as_millis() as u64 / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(Duration::from_secs(30))
            .take(self.retries)
    }

    async fn download_once(
        &self,
        url: &str,
        destination: &Path,
        progress: Option<&DownloadProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        if cancel.is_cancelled() {
            return Err(ContentError::cancelled(format!("download {}", url)));
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| classify_reqwest_error(url, source))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContentError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let total = response.content_length();
        let partial = partial_path(destination);
        let mut file = fs::File::create(&partial)
            .await
            .map_err(|e| ContentError::file_system(&partial, FileOperation::Create, e))?;

        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;
        let mut last_report = Instant::now();

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    drop(file);
                    let _ = fs::remove_file(&partial).await;
                    return Err(ContentError::cancelled(format!("download {}", url)));
                }
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk.map_err(|source| classify_reqwest_error(url, source))?;

            file.write_all(&chunk)
                .await
                .map_err(|e| ContentError::file_system(&partial, FileOperation::Write, e))?;
            downloaded += chunk.len() as u64;

            if last_report.elapsed() >= Duration::from_millis(100) {
                if let Some(callback) = progress {
                    callback(downloaded, total);
                }
                last_report = Instant::now();
            }
        }

        file.flush()
            .await
            .map_err(|e| ContentError::file_system(&partial, FileOperation::Write, e))?;
        drop(file);

        fs::rename(&partial, destination)
            .await
            .map_err(|e| ContentError::file_system(destination, FileOperation::Write, e))?;

        if let Some(callback) = progress {
            callback(downloaded, total.or(Some(downloaded)));
        }
        Ok(downloaded)
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    destination.with_file_name(format!("{}.part", name))
}

#[async_trait]
impl DownloadService for HttpDownloadService {
    async fn download_file(
        &self,
        url: &str,
        destination: &Path,
        expected_hash: Option<&str>,
        progress: Option<DownloadProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ContentError::file_system(parent, FileOperation::CreateDir, e))?;
        }

        debug!("Downloading {} to {}", url, destination.display());
        let mut attempt = 0usize;
        let bytes = RetryIf::spawn(
            self.retry_strategy(),
            || {
                attempt += 1;
                if attempt > 1 {
                    debug!("Retrying {} (attempt {})", url, attempt);
                }
                self.download_once(url, destination, progress.as_ref(), cancel)
            },
            |e: &ContentError| {
                let retry = e.is_recoverable() && !cancel.is_cancelled();
                if retry {
                    warn!("Download of {} failed, will retry: {}", url, e);
                }
                retry
            },
        )
        .await?;

        if let Some(expected) = expected_hash {
            let actual = self.hasher.compute_file_hash(destination, cancel).await?;
            if !actual.eq_ignore_ascii_case(expected) {
                let _ = fs::remove_file(destination).await;
                return Err(ContentError::HashMismatch {
                    path: destination.to_path_buf(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::hash::{xxhash64_hex, XxHashFileHashProvider};
    use std::sync::atomic::{AtomicU64, Ordering};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service() -> HttpDownloadService {
        let config = PipelineConfig::builder()
            .download_retries(2)
            .retry_delay(Duration::from_millis(10))
            .build()
            .unwrap();
        HttpDownloadService::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_download_writes_file_and_reports_progress() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gent.dat"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"archive bytes".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("nested").join("gent.dat");
        let last = Arc::new(AtomicU64::new(0));
        let sink = last.clone();
        let progress: DownloadProgressCallback = Arc::new(move |done, _| sink.store(done, Ordering::SeqCst));

        let bytes = service()
            .download_file(&format!("{}/gent.dat", server.uri()), &destination, None, Some(progress), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(bytes, 13);
        assert_eq!(std::fs::read(&destination).unwrap(), b"archive bytes");
        assert_eq!(last.load(Ordering::SeqCst), 13);
        assert!(!partial_path(&destination).exists());
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let result = service()
            .download_file(&server.uri(), &dir.path().join("x.zip"), None, None, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ContentError::HttpStatus { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let result = service()
            .download_file(&server.uri(), &dir.path().join("x.zip"), None, None, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ContentError::HttpStatus { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_hash_verification() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let good = xxhash64_hex(xxhash_rust::xxh64::xxh64(b"payload", 0));
        let service = service().with_hasher(Arc::new(XxHashFileHashProvider::new()));

        let ok = service
            .download_file(&server.uri(), &dir.path().join("a.bin"), Some(good.as_str()), None, &CancellationToken::new())
            .await;
        assert!(ok.is_ok());

        let destination = dir.path().join("b.bin");
        let bad = service
            .download_file(&server.uri(), &destination, Some("0000000000000000"), None, &CancellationToken::new())
            .await;
        assert!(matches!(bad, Err(ContentError::HashMismatch { .. })));
        assert!(!destination.exists());
    }
}
