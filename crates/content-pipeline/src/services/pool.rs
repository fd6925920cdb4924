//! Manifest pool: the content-addressable store's manifest interface

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::{report, AcquisitionPhase, ContentError, ProgressCallback, Result};
use crate::model::ContentManifest;

/// Persistent store of acquired manifests
#[async_trait]
pub trait ContentManifestPool: Send + Sync {
    /// Store `manifest`, replacing any manifest with the same id
    async fn add_manifest(
        &self,
        manifest: &ContentManifest,
        source_dir: Option<&Path>,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn get_all_manifests(&self) -> Result<Vec<ContentManifest>>;

    async fn get_manifest(&self, manifest_id: &str) -> Result<Option<ContentManifest>>;

    /// Returns whether a manifest was removed
    async fn remove_manifest(&self, manifest_id: &str) -> Result<bool>;
}

#[derive(Debug, Clone)]
struct PoolEntry {
    manifest: ContentManifest,
    source_dir: Option<PathBuf>,
}

/// Pool kept in memory, ordered by first insertion
#[derive(Debug, Default)]
pub struct InMemoryManifestPool {
    entries: RwLock<Vec<PoolEntry>>,
}

impl InMemoryManifestPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Directory the manifest's files were stored from
    pub async fn source_dir(&self, manifest_id: &str) -> Option<PathBuf> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.manifest.id == manifest_id)
            .and_then(|e| e.source_dir.clone())
    }

    /// Snapshot of id to manifest
    pub async fn snapshot(&self) -> HashMap<String, ContentManifest> {
        self.entries
            .read()
            .await
            .iter()
            .map(|e| (e.manifest.id.clone(), e.manifest.clone()))
            .collect()
    }
}

#[async_trait]
impl ContentManifestPool for InMemoryManifestPool {
    async fn add_manifest(
        &self,
        manifest: &ContentManifest,
        source_dir: Option<&Path>,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(ContentError::cancelled(format!("store {}", manifest.id)));
        }
        if manifest.id.trim().is_empty() {
            return Err(ContentError::Storage {
                manifest_id: manifest.id.clone(),
                reason: "manifest id is empty".to_string(),
            });
        }

        report(progress.as_ref(), AcquisitionPhase::Storing, 0.0, format!("Storing {}", manifest.name));

        let mut stored = manifest.clone();
        stored.mark_content_addressable();
        let entry = PoolEntry {
            manifest: stored,
            source_dir: source_dir.map(Path::to_path_buf),
        };

        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|e| e.manifest.id == manifest.id) {
            Some(existing) => {
                debug!("Replacing manifest '{}' in pool", manifest.id);
                *existing = entry;
            }
            None => {
                info!("Added manifest '{}' to pool", manifest.id);
                entries.push(entry);
            }
        }
        drop(entries);

        report(progress.as_ref(), AcquisitionPhase::Storing, 100.0, format!("Stored {}", manifest.name));
        Ok(())
    }

    async fn get_all_manifests(&self) -> Result<Vec<ContentManifest>> {
        Ok(self.entries.read().await.iter().map(|e| e.manifest.clone()).collect())
    }

    async fn get_manifest(&self, manifest_id: &str) -> Result<Option<ContentManifest>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .find(|e| e.manifest.id == manifest_id)
            .map(|e| e.manifest.clone()))
    }

    async fn remove_manifest(&self, manifest_id: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.manifest.id != manifest_id);
        Ok(entries.len() != before)
    }
}
