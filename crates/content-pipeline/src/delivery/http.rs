//! Deliverer for plain remote files (no archive)

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::core::{report, AcquisitionPhase, ContentError, ProgressCallback, Result};
use crate::delivery::{download_with_mirrors, ensure_unique_download_paths, ContentDeliverer};
use crate::model::{ContentManifest, ContentSourceType};
use crate::services::{DownloadService, FileHashProvider};

pub struct HttpContentDeliverer {
    downloader: Arc<dyn DownloadService>,
    hasher: Arc<dyn FileHashProvider>,
}

impl HttpContentDeliverer {
    pub fn new(downloader: Arc<dyn DownloadService>, hasher: Arc<dyn FileHashProvider>) -> Self {
        Self { downloader, hasher }
    }
}

#[async_trait]
impl ContentDeliverer for HttpContentDeliverer {
    fn name(&self) -> &str {
        "http"
    }

    fn can_deliver(&self, manifest: &ContentManifest) -> bool {
        manifest.downloadable_files().next().is_some()
            && manifest.downloadable_files().all(|f| f.effective_archive_kind().is_none())
    }

    async fn deliver(
        &self,
        manifest: &ContentManifest,
        target_dir: &Path,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<ContentManifest> {
        ensure_unique_download_paths(manifest)?;

        let mut delivered = manifest.clone();
        let total = delivered.files.len();
        for (index, file) in delivered.files.iter_mut().enumerate() {
            if file.download_url.is_none() {
                continue;
            }
            let destination = target_dir.join(&file.relative_path);
            let bytes = download_with_mirrors(self.downloader.as_ref(), file, &destination, progress.as_ref(), cancel).await?;

            if file.hash.is_none() {
                file.hash = Some(self.hasher.compute_file_hash(&destination, cancel).await?);
            }
            if file.size == 0 {
                file.size = bytes;
            }
            file.source_path = Some(destination);
            file.transition_source_type(ContentSourceType::ExtractedPackage);
            report(
                progress.as_ref(),
                AcquisitionPhase::Downloading,
                (index + 1) as f64 * 100.0 / total as f64,
                format!("Downloaded {}", file.relative_path),
            );
        }

        if delivered.files.iter().all(|f| f.source_path.is_none()) {
            return Err(ContentError::Delivery {
                manifest_id: manifest.id.clone(),
                reason: "nothing was downloaded".to_string(),
            });
        }
        info!("Downloaded {} file(s) for {}", total, manifest.name);
        Ok(delivered)
    }

    async fn validate(&self, manifest: &ContentManifest) -> Result<bool> {
        Ok(self.can_deliver(manifest)
            && manifest
                .downloadable_files()
                .all(|f| f.candidate_urls().iter().all(|url| url::Url::parse(url).is_ok())))
    }
}
