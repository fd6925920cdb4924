//! Deliverer for content already on disk

use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::core::{report, AcquisitionPhase, ContentError, ProgressCallback, Result};
use crate::delivery::{stage_files, ContentDeliverer};
use crate::model::ContentManifest;

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalContentDeliverer;

impl LocalContentDeliverer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContentDeliverer for LocalContentDeliverer {
    fn name(&self) -> &str {
        "local"
    }

    fn can_deliver(&self, manifest: &ContentManifest) -> bool {
        !manifest.files.is_empty() && manifest.files.iter().all(|f| f.source_path.is_some())
    }

    async fn deliver(
        &self,
        manifest: &ContentManifest,
        target_dir: &Path,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<ContentManifest> {
        if let Some(missing) = manifest
            .files
            .iter()
            .find(|f| f.source_path.as_deref().is_none_or(|p| !p.is_file()))
        {
            return Err(ContentError::Delivery {
                manifest_id: manifest.id.clone(),
                reason: format!("local file '{}' is missing", missing.relative_path),
            });
        }

        report(progress.as_ref(), AcquisitionPhase::Extracting, 0.0, format!("Copying {}", manifest.name));
        let staged = stage_files(manifest, target_dir, cancel).await?;
        report(progress.as_ref(), AcquisitionPhase::Extracting, 100.0, format!("Copied {}", manifest.name));
        Ok(staged)
    }

    async fn validate(&self, manifest: &ContentManifest) -> Result<bool> {
        Ok(self.can_deliver(manifest)
            && manifest
                .files
                .iter()
                .all(|f| f.source_path.as_deref().is_some_and(Path::is_file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentManifestBuilder, ManifestFile};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_copies_local_files() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("mods").join("data.big");
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        std::fs::write(&source, b"big").unwrap();

        let manifest = ContentManifestBuilder::new()
            .with_basic_info("Shockwave", "1.2")
            .add_file(ManifestFile::extracted("data.big", source.clone(), 3))
            .build()
            .unwrap();

        let deliverer = LocalContentDeliverer::new();
        assert!(deliverer.validate(&manifest).await.unwrap());

        let target = dir.path().join("staging");
        let staged = deliverer.deliver(&manifest, &target, None, &CancellationToken::new()).await.unwrap();
        assert_eq!(std::fs::read(target.join("data.big")).unwrap(), b"big");
        assert_eq!(staged.files[0].source_path.as_deref(), Some(target.join("data.big").as_path()));

        std::fs::remove_file(&source).unwrap();
        let result = deliverer.deliver(&manifest, &target, None, &CancellationToken::new()).await;
        assert!(matches!(result, Err(ContentError::Delivery { .. })));
    }
}
