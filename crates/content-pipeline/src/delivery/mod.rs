//! Content deliverers: fetch, extract and stage the files a manifest references
//!
//! A deliverer receives a resolved manifest and a target directory. It
//! leaves the manifest's files in the target directory and returns the
//! manifest as staged (source paths pointing into the target).

use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{report, AcquisitionPhase, ContentError, FileOperation, ProgressCallback, Result};
use crate::model::{ContentManifest, ContentSourceType, ManifestFile};
use crate::services::{DownloadProgressCallback, DownloadService};

pub mod archive;
pub mod extract;
pub mod github_zip;
pub mod http;
pub mod local;

pub use archive::ArchiveContentDeliverer;
pub use extract::{extract_archive, ExtractProgressCallback};
pub use github_zip::GitHubZipDeliverer;
pub use http::HttpContentDeliverer;
pub use local::LocalContentDeliverer;

#[async_trait]
pub trait ContentDeliverer: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this deliverer applies to `manifest`; no side effects
    fn can_deliver(&self, manifest: &ContentManifest) -> bool;

    async fn deliver(
        &self,
        manifest: &ContentManifest,
        target_dir: &Path,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<ContentManifest>;

    /// Check that the manifest carries what delivery needs
    async fn validate(&self, manifest: &ContentManifest) -> Result<bool>;
}

/// Reject two downloadable files that would land on the same path
pub fn ensure_unique_download_paths(manifest: &ContentManifest) -> Result<()> {
    match manifest.find_duplicate_path(|f| f.download_url.is_some()) {
        Some(path) => Err(ContentError::DuplicateFilePath {
            manifest_id: manifest.id.clone(),
            path,
        }),
        None => Ok(()),
    }
}

fn download_progress(progress: Option<&ProgressCallback>, label: &str) -> Option<DownloadProgressCallback> {
    let callback = progress?.clone();
    let label = label.to_string();
    Some(std::sync::Arc::new(move |downloaded: u64, total: Option<u64>| {
        let percent = match total {
            Some(total) if total > 0 => downloaded as f64 * 100.0 / total as f64,
            _ => 0.0,
        };
        report(
            Some(&callback),
            AcquisitionPhase::Downloading,
            percent,
            format!("Downloading {} ({} bytes)", label, downloaded),
        );
    }))
}

/// Download `file` to `destination`, trying the primary URL and then each mirror in order
pub async fn download_with_mirrors(
    downloader: &dyn DownloadService,
    file: &ManifestFile,
    destination: &Path,
    progress: Option<&ProgressCallback>,
    cancel: &CancellationToken,
) -> Result<u64> {
    let urls = file.candidate_urls();
    if urls.is_empty() {
        return Err(ContentError::DownloadExhausted {
            file: file.relative_path.clone(),
            attempted_urls: 0,
            last_error: "file has no download URL".to_string(),
        });
    }

    // Hashes are checked after staging, where a mismatch is only a warning
    if file.hash.is_some() {
        debug!("Deferring hash check of {} to staged validation", file.relative_path);
    }

    let mut last_error = String::new();
    for (index, url) in urls.iter().enumerate() {
        if index > 0 {
            info!("Trying mirror {} of {} for {}", index, urls.len() - 1, file.relative_path);
        }
        match downloader
            .download_file(
                url,
                destination,
                None,
                download_progress(progress, &file.relative_path),
                cancel,
            )
            .await
        {
            Ok(bytes) => return Ok(bytes),
            Err(e @ ContentError::Cancelled { .. }) => return Err(e),
            Err(e) => {
                warn!("Download of {} from {} failed: {}", file.relative_path, url, e);
                last_error = e.to_string();
            }
        }
    }

    Err(ContentError::DownloadExhausted {
        file: file.relative_path.clone(),
        attempted_urls: urls.len(),
        last_error,
    })
}

/// Copy every file with a local source into `target_dir`, returning the manifest as staged
pub async fn stage_files(
    manifest: &ContentManifest,
    target_dir: &Path,
    cancel: &CancellationToken,
) -> Result<ContentManifest> {
    let mut staged = manifest.clone();
    for file in &mut staged.files {
        if cancel.is_cancelled() {
            return Err(ContentError::cancelled(format!("stage {}", manifest.id)));
        }
        let Some(source) = file.source_path.clone() else {
            continue;
        };

        let destination = target_dir.join(&file.relative_path);
        if source != destination {
            if let Some(parent) = destination.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ContentError::file_system(parent, FileOperation::CreateDir, e))?;
            }
            tokio::fs::copy(&source, &destination)
                .await
                .map_err(|e| ContentError::file_system(&source, FileOperation::Copy, e))?;
        }
        file.source_path = Some(destination);
        file.transition_source_type(ContentSourceType::ExtractedPackage);
    }
    debug!("Staged {} file(s) of {} into {}", staged.files.len(), manifest.id, target_dir.display());
    Ok(staged)
}

/// Best-effort removal; failures are logged and never returned
pub async fn cleanup_path(path: &Path) {
    let result = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        warn!("Failed to clean up {}: {}", path.display(), e);
    }
}

/// Fresh scratch directory for downloads and extraction
pub(crate) fn scratch_dir(prefix: &str) -> Result<tempfile::TempDir> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .map_err(|e| ContentError::file_system(std::env::temp_dir(), FileOperation::CreateDir, e))
}

/// Remove a scratch directory, logging instead of failing
pub(crate) fn close_scratch(scratch: tempfile::TempDir) {
    let path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        warn!("Failed to clean up {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PipelineConfig;
    use crate::model::ContentManifestBuilder;
    use crate::services::HttpDownloadService;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn downloader() -> HttpDownloadService {
        let config = PipelineConfig::builder()
            .download_retries(0)
            .retry_delay(Duration::from_millis(1))
            .build()
            .unwrap();
        HttpDownloadService::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_falls_back_to_mirror() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/primary/gent.zip"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/mirror/gent.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"zipdata".to_vec()))
            .mount(&server)
            .await;

        let mut file = ManifestFile::remote("gent.zip", format!("{}/primary/gent.zip", server.uri()), 7);
        file.mirror_urls = vec![format!("{}/mirror/gent.zip", server.uri())];

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("gent.zip");
        let bytes = download_with_mirrors(&downloader(), &file, &dest, None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(bytes, 7);
        assert_eq!(std::fs::read(dest).unwrap(), b"zipdata");
    }

    #[tokio::test]
    async fn test_stale_manifest_hash_does_not_fail_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gent.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"zipdata".to_vec()))
            .mount(&server)
            .await;

        let mut file = ManifestFile::remote("gent.zip", format!("{}/gent.zip", server.uri()), 7);
        file.hash = Some("00000000deadbeef".to_string());
        file.mirror_urls = vec![format!("{}/gent.zip", server.uri())];

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("gent.zip");
        let bytes = download_with_mirrors(&downloader(), &file, &dest, None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(bytes, 7);
        assert_eq!(std::fs::read(dest).unwrap(), b"zipdata");
        // The primary URL succeeded, so no mirror was tried
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_all_mirrors_failing_is_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

        let mut file = ManifestFile::remote("gent.zip", format!("{}/a.zip", server.uri()), 0);
        file.mirror_urls = vec![format!("{}/b.zip", server.uri())];

        let dir = TempDir::new().unwrap();
        let result =
            download_with_mirrors(&downloader(), &file, &dir.path().join("gent.zip"), None, &CancellationToken::new())
                .await;
        assert!(matches!(result, Err(ContentError::DownloadExhausted { attempted_urls: 2, .. })));
    }

    #[tokio::test]
    async fn test_stage_files_copies_into_target() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src").join("a.big");
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        std::fs::write(&source, b"data").unwrap();

        let manifest = ContentManifestBuilder::new()
            .with_basic_info("Staged", "1")
            .add_file(ManifestFile::extracted("Data/a.big", source, 4))
            .build()
            .unwrap();

        let target = dir.path().join("target");
        let staged = stage_files(&manifest, &target, &CancellationToken::new()).await.unwrap();
        assert_eq!(std::fs::read(target.join("Data").join("a.big")).unwrap(), b"data");
        assert_eq!(staged.files[0].source_path.as_deref(), Some(target.join("Data/a.big").as_path()));
    }

    #[tokio::test]
    async fn test_cleanup_tolerates_missing_paths() {
        let dir = TempDir::new().unwrap();
        cleanup_path(&dir.path().join("missing")).await;
        std::fs::write(dir.path().join("file"), b"x").unwrap();
        cleanup_path(&dir.path().join("file")).await;
        assert!(!dir.path().join("file").exists());
    }
}
