//! Deliverer for GitHub release assets
//!
//! Every asset of the release is fetched. Game clients and mods often ship
//! a zip inside the release zip, so for those types nested zips are
//! unpacked in place before manifests are derived.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::{report, AcquisitionPhase, ContentError, ProgressCallback, Result};
use crate::delivery::archive::ExtractionPipeline;
use crate::delivery::extract::{extract_archive, ExtractProgressCallback};
use crate::delivery::{cleanup_path, close_scratch, ensure_unique_download_paths, scratch_dir, ContentDeliverer};
use crate::factory::ManifestFactoryRegistry;
use crate::model::{ArchiveKind, ContentManifest, ContentType, PublisherType};
use crate::services::{ContentManifestPool, DownloadService};

pub struct GitHubZipDeliverer {
    pipeline: ExtractionPipeline,
}

impl GitHubZipDeliverer {
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
}

fn expands_nested_archives(content_type: ContentType) -> bool {
    matches!(content_type, ContentType::GameClient | ContentType::Mod)
}

fn nested_zips(root: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && ArchiveKind::from_file_name(&e.file_name().to_string_lossy()) == Some(ArchiveKind::Zip))
        .map(|e| e.into_path())
        .collect()
}

/// Unpack every zip below `root` next to itself and delete it; returns how many were unpacked
pub async fn expand_nested_zips(
    root: &Path,
    progress: Option<&ProgressCallback>,
    cancel: &CancellationToken,
) -> Result<usize> {
    let zips = nested_zips(root);
    for zip in &zips {
        let parent = zip.parent().unwrap_or(root);
        let label = zip.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let per_entry: Option<ExtractProgressCallback> = progress.cloned().map(|callback| {
            let label = label.clone();
            Arc::new(move |done: u64, total: u64| {
                let percent = if total == 0 { 100.0 } else { done as f64 * 100.0 / total as f64 };
                report(Some(&callback), AcquisitionPhase::Extracting, percent, format!("Unpacking {} ({}/{})", label, done, total));
            }) as ExtractProgressCallback
        });

        extract_archive(zip, ArchiveKind::Zip, parent, per_entry, cancel).await?;
        cleanup_path(zip).await;
        debug!("Unpacked nested archive {}", zip.display());
    }
    Ok(zips.len())
}

#[async_trait]
impl ContentDeliverer for GitHubZipDeliverer {
    fn name(&self) -> &str {
        "githubzip"
    }

    fn can_deliver(&self, manifest: &ContentManifest) -> bool {
        manifest.publisher.publisher_type == PublisherType::GitHub && manifest.downloadable_files().next().is_some()
    }

    async fn deliver(
        &self,
        manifest: &ContentManifest,
        target_dir: &Path,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<ContentManifest> {
        ensure_unique_download_paths(manifest)?;
        let files: Vec<_> = manifest.downloadable_files().collect();
        if files.is_empty() {
            return Err(ContentError::Delivery {
                manifest_id: manifest.id.clone(),
                reason: "release has no downloadable assets".to_string(),
            });
        }

        let scratch = scratch_dir("github-delivery-")?;
        let downloads_dir = scratch.path().join("download");
        let extracted_dir = scratch.path().join("extracted");

        let result = async {
            self.pipeline
                .fetch_and_extract(&files, &downloads_dir, &extracted_dir, progress.as_ref(), cancel)
                .await?;
            if expands_nested_archives(manifest.content_type) {
                let expanded = expand_nested_zips(&extracted_dir, progress.as_ref(), cancel).await?;
                if expanded > 0 {
                    info!("Unpacked {} nested archive(s) for {}", expanded, manifest.name);
                }
            }
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
        Ok(self.can_deliver(manifest)
            && manifest
                .downloadable_files()
                .flat_map(|f| f.candidate_urls())
                .all(|url| url::Url::parse(&url).is_ok()))
    }
}
