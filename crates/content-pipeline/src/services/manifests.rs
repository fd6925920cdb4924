//! Discovery of manifest files already present on disk

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::core::{ContentError, FileOperation, Result};
use crate::model::ContentManifest;

/// File suffix of manifests written next to local content
pub const MANIFEST_FILE_SUFFIX: &str = ".manifest.json";

/// How often a walk checks its cancellation token
const CANCEL_CHECK_INTERVAL: usize = 256;

/// A manifest found on disk and the directory holding its files
#[derive(Debug, Clone)]
pub struct DiscoveredManifest {
    pub manifest: ContentManifest,
    pub manifest_path: PathBuf,
    pub content_dir: PathBuf,
}

/// Finds manifests in a set of content directories
#[async_trait]
pub trait ManifestDiscovery: Send + Sync {
    async fn discover_manifests(&self, directories: &[PathBuf], cancel: &CancellationToken) -> Result<Vec<DiscoveredManifest>>;
}

/// Reads `*.manifest.json` files below each directory
#[derive(Debug, Default, Clone)]
pub struct JsonManifestDiscovery {
    max_depth: Option<usize>,
}

impl JsonManifestDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    fn walk(&self, directory: &Path, cancel: &CancellationToken) -> Result<Vec<DiscoveredManifest>> {
        if !directory.is_dir() {
            debug!("Content directory {} does not exist, skipping", directory.display());
            return Ok(Vec::new());
        }

        let mut walker = WalkDir::new(directory).follow_links(false);
        if let Some(depth) = self.max_depth {
            walker = walker.max_depth(depth);
        }

        let mut found = Vec::new();
        for (index, entry) in walker.into_iter().enumerate() {
            if index % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(ContentError::cancelled(format!("scan {}", directory.display())));
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", directory.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !entry.file_name().to_string_lossy().ends_with(MANIFEST_FILE_SUFFIX) {
                continue;
            }

            match read_manifest(entry.path()) {
                Ok(manifest) => found.push(DiscoveredManifest {
                    manifest,
                    manifest_path: entry.path().to_path_buf(),
                    content_dir: entry.path().parent().unwrap_or(directory).to_path_buf(),
                }),
                Err(e) => warn!("Ignoring manifest {}: {}", entry.path().display(), e),
            }
        }
        Ok(found)
    }
}

/// Read and parse one manifest file
pub fn read_manifest(path: &Path) -> Result<ContentManifest> {
    let text = std::fs::read_to_string(path).map_err(|e| ContentError::file_system(path, FileOperation::Read, e))?;
    serde_json::from_str(&text).map_err(|source| ContentError::Json {
        context: path.display().to_string(),
        source,
    })
}

#[async_trait]
impl ManifestDiscovery for JsonManifestDiscovery {
    async fn discover_manifests(&self, directories: &[PathBuf], cancel: &CancellationToken) -> Result<Vec<DiscoveredManifest>> {
        let discovery = self.clone();
        let directories = directories.to_vec();
        let cancel = cancel.clone();

        tokio::task::spawn_blocking(move || {
            let mut all = Vec::new();
            for directory in &directories {
                all.extend(discovery.walk(directory, &cancel)?);
            }
            Ok(all)
        })
        .await
        .map_err(|e| ContentError::file_system(
            PathBuf::from("<content directories>"),
            FileOperation::Walk,
            std::io::Error::other(format!("manifest scan task failed: {}", e)),
        ))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentManifestBuilder;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_discovers_manifests_and_skips_broken_ones() {
        let root = TempDir::new().unwrap();
        let mod_dir = root.path().join("mods").join("shockwave");
        std::fs::create_dir_all(&mod_dir).unwrap();

        let manifest = ContentManifestBuilder::new().with_basic_info("ShockWave", "1.2").build().unwrap();
        std::fs::write(
            mod_dir.join("shockwave.manifest.json"),
            serde_json::to_string_pretty(&manifest).unwrap(),
        )
        .unwrap();
        std::fs::write(root.path().join("broken.manifest.json"), "{").unwrap();
        std::fs::write(root.path().join("readme.json"), "{}").unwrap();

        let found = JsonManifestDiscovery::new()
            .discover_manifests(
                &[root.path().to_path_buf(), root.path().join("missing")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].manifest, manifest);
        assert_eq!(found[0].content_dir, mod_dir);
    }

    #[tokio::test]
    async fn test_cancelled_scan() {
        let root = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = JsonManifestDiscovery::new()
            .discover_manifests(&[root.path().to_path_buf()], &cancel)
            .await;
        assert!(matches!(result, Err(ContentError::Cancelled { .. })));
    }
}
