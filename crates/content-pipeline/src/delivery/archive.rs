//! Deliverer for manifests that point at a zip or 7z archive

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::{report, AcquisitionPhase, ContentError, FileOperation, ProgressCallback, Result};
use crate::delivery::extract::{extract_archive, ExtractProgressCallback};
use crate::delivery::{
    close_scratch, download_with_mirrors, ensure_unique_download_paths, scratch_dir, stage_files, ContentDeliverer,
};
use crate::factory::{scan_and_hash, single_content_manifest, ManifestFactoryRegistry};
use crate::model::{ArchiveKind, ContentManifest, ManifestFile};
use crate::resolution::file_name_from_url;
use crate::services::{ContentManifestPool, DownloadService};

/// Download, extract, re-derive manifests and register them
///
/// Shared by the archive and GitHub deliverers; they differ in which files
/// they fetch and in what happens to the tree between extraction and
/// manifest derivation.
pub(crate) struct ExtractionPipeline {
    pub(crate) downloader: Arc<dyn DownloadService>,
    pub(crate) pool: Arc<dyn ContentManifestPool>,
    pub(crate) factories: ManifestFactoryRegistry,
}

impl ExtractionPipeline {
    /// Fetch `files` into `extracted_dir`: archives are unpacked, anything else is copied in place
    pub(crate) async fn fetch_and_extract(
        &self,
        files: &[&ManifestFile],
        downloads_dir: &Path,
        extracted_dir: &Path,
        progress: Option<&ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        for (index, file) in files.iter().enumerate() {
            let download_name = file
                .download_url
                .as_deref()
                .and_then(file_name_from_url)
                .unwrap_or_else(|| format!("download-{}", index));

            match file.effective_archive_kind() {
                Some(kind) => {
                    let archive_path = downloads_dir.join(&download_name);
                    download_with_mirrors(self.downloader.as_ref(), file, &archive_path, progress, cancel).await?;
                    report(progress, AcquisitionPhase::Extracting, 0.0, format!("Extracting {}", download_name));
                    let count =
                        extract_archive(&archive_path, kind, extracted_dir, extract_progress(progress), cancel).await?;
                    info!("Extracted {} file(s) from {}", count, download_name);
                }
                None => {
                    let destination = extracted_dir.join(&file.relative_path);
                    download_with_mirrors(self.downloader.as_ref(), file, &destination, progress, cancel).await?;
                }
            }
        }
        report(progress, AcquisitionPhase::Extracting, 100.0, "Extraction complete");
        Ok(())
    }

    /// Manifests for the extracted tree, falling back to one manifest over every file
    pub(crate) async fn derive_manifests(
        &self,
        original: &ContentManifest,
        extracted_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentManifest>> {
        if let Some(factory) = self.factories.find(original) {
            let manifests = factory
                .create_manifests_from_extracted_content(original, extracted_dir, cancel)
                .await?;
            if !manifests.is_empty() {
                debug!("Factory '{}' produced {} manifest(s) for {}", factory.name(), manifests.len(), original.id);
                return Ok(manifests);
            }
        }

        let files = scan_and_hash(extracted_dir, cancel).await?;
        match single_content_manifest(original, &files)? {
            Some(manifest) => {
                debug!("Using generic manifest with {} file(s) for {}", manifest.files.len(), original.id);
                Ok(vec![manifest])
            }
            None => Err(ContentError::Delivery {
                manifest_id: original.id.clone(),
                reason: "archive contained no files".to_string(),
            }),
        }
    }

    /// Register every manifest, stage the primary one into `target_dir` and return it
    pub(crate) async fn register_and_stage(
        &self,
        original: &ContentManifest,
        mut manifests: Vec<ContentManifest>,
        extracted_dir: &Path,
        target_dir: &Path,
        progress: Option<&ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<ContentManifest> {
        for manifest in &mut manifests {
            self.pool
                .add_manifest(manifest, Some(extracted_dir), progress.cloned(), cancel)
                .await?;
            manifest.mark_content_addressable();
        }

        let primary_index = manifests.iter().position(|m| m.id == original.id).unwrap_or(0);
        let primary = manifests.swap_remove(primary_index);
        tokio::fs::create_dir_all(target_dir)
            .await
            .map_err(|e| ContentError::file_system(target_dir, FileOperation::CreateDir, e))?;
        stage_files(&primary, target_dir, cancel).await
    }
}

fn extract_progress(progress: Option<&ProgressCallback>) -> Option<ExtractProgressCallback> {
    let callback = progress?.clone();
    Some(Arc::new(move |done: u64, total: u64| {
        let percent = if total == 0 { 100.0 } else { done as f64 * 100.0 / total as f64 };
        report(Some(&callback), AcquisitionPhase::Extracting, percent, format!("Extracted {} of {} entries", done, total));
    }))
}

/// Delivers the first archive of a manifest
pub struct ArchiveContentDeliverer {
    pipeline: ExtractionPipeline,
}

impl ArchiveContentDeliverer {
    pub fn new(
        downloader: Arc<dyn DownloadService>,
        pool: Arc<dyn ContentManifestPool>,
        factories: ManifestFactoryRegistry,
    ) -> Self {
        Self {
            pipeline: ExtractionPipeline {
                downloader,
                pool,
                factories,
            },
        }
    }

    fn archive_file(manifest: &ContentManifest) -> Option<(&ManifestFile, ArchiveKind)> {
        manifest
            .downloadable_files()
            .find_map(|f| f.effective_archive_kind().map(|kind| (f, kind)))
    }
}

#[async_trait]
impl ContentDeliverer for ArchiveContentDeliverer {
    fn name(&self) -> &str {
        "archive"
    }

    fn can_deliver(&self, manifest: &ContentManifest) -> bool {
        Self::archive_file(manifest).is_some()
    }

    async fn deliver(
        &self,
        manifest: &ContentManifest,
        target_dir: &Path,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<ContentManifest> {
        ensure_unique_download_paths(manifest)?;
        let (archive, _) = Self::archive_file(manifest).ok_or_else(|| ContentError::Delivery {
            manifest_id: manifest.id.clone(),
            reason: "manifest has no archive to download".to_string(),
        })?;

        let scratch = scratch_dir("archive-delivery-")?;
        let downloads_dir = scratch.path().join("download");
        let extracted_dir = scratch.path().join("extracted");

        let result = async {
            self.pipeline
                .fetch_and_extract(&[archive], &downloads_dir, &extracted_dir, progress.as_ref(), cancel)
                .await?;
            let manifests = self.pipeline.derive_manifests(manifest, &extracted_dir, cancel).await?;
            self.pipeline
                .register_and_stage(manifest, manifests, &extracted_dir, target_dir, progress.as_ref(), cancel)
                .await
        }
        .await;

        close_scratch(scratch);
        result
    }

    async fn validate(&self, manifest: &ContentManifest) -> Result<bool> {
        Ok(Self::archive_file(manifest).is_some_and(|(file, _)| {
            file.candidate_urls().iter().all(|url| url::Url::parse(url).is_ok())
        }))
    }
}
