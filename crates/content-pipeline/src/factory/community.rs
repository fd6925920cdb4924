//! Manifest factory for Community Outpost archives

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::Result;
use crate::factory::{bucketed_manifests, locate_content_root, scan_and_hash, single_content_manifest, ManifestFactory};
use crate::model::{ContentManifest, PublisherType};

#[derive(Debug, Default, Clone, Copy)]
pub struct CommunityContentFactory;

impl CommunityContentFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ManifestFactory for CommunityContentFactory {
    fn name(&self) -> &str {
        "communityoutpost"
    }

    fn can_handle(&self, manifest: &ContentManifest) -> bool {
        manifest.publisher.publisher_type == PublisherType::CommunityOutpost
    }

    async fn create_manifests_from_extracted_content(
        &self,
        original: &ContentManifest,
        extracted_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentManifest>> {
        let root = self.get_manifest_directory(original, extracted_dir);
        let files = scan_and_hash(&root, cancel).await?;
        debug!("Community archive {} holds {} file(s) under {}", original.id, files.len(), root.display());

        if original.metadata.identity_marker.is_some() {
            return Ok(single_content_manifest(original, &files)?.into_iter().collect());
        }
        bucketed_manifests(original, original.target_game, &files)
    }

    fn get_manifest_directory(&self, manifest: &ContentManifest, extracted_dir: &Path) -> PathBuf {
        locate_content_root(manifest.target_game, extracted_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentManifestBuilder, ContentType, GameType, InstallTarget, PublisherInfo};
    use tempfile::TempDir;

    fn original(marker: Option<&str>) -> ContentManifest {
        let mut builder = ContentManifestBuilder::new()
            .with_basic_info("controlbarpro", "2.13")
            .with_content_type(ContentType::Addon, GameType::ZeroHour)
            .with_publisher(PublisherInfo {
                id: "communityoutpost".to_string(),
                publisher_type: PublisherType::CommunityOutpost,
                ..Default::default()
            });
        if let Some(marker) = marker {
            builder = builder.with_identity_marker(marker);
        }
        builder.build().unwrap()
    }

    #[tokio::test]
    async fn test_identity_marker_keeps_everything_in_one_manifest() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("Data")).unwrap();
        std::fs::write(dir.path().join("Data").join("ControlBarPro.big"), b"bar").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"hi").unwrap();
        std::fs::write(dir.path().join("custom.map"), b"m").unwrap();

        let original = original(Some("cbpr"));
        let manifests = CommunityContentFactory::new()
            .create_manifests_from_extracted_content(&original, dir.path(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(manifests.len(), 1);
        let manifest = &manifests[0];
        assert_eq!(manifest.id, original.id);
        assert_eq!(manifest.files.len(), 3);
        let map = manifest.files.iter().find(|f| f.relative_path == "custom.map").unwrap();
        assert_eq!(map.install_target, InstallTarget::UserMapsDirectory);
        assert!(manifest.files.iter().all(|f| f.hash.is_some()));
    }

    #[tokio::test]
    async fn test_buckets_multi_content_archive() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("generals.exe"), b"exe").unwrap();
        std::fs::write(dir.path().join("hotkeys.ini"), b"keys").unwrap();
        std::fs::write(dir.path().join("patch.dll"), b"dll").unwrap();

        let manifests = CommunityContentFactory::new()
            .create_manifests_from_extracted_content(&original(None), dir.path(), &CancellationToken::new())
            .await
            .unwrap();

        let summary: Vec<_> = manifests
            .iter()
            .map(|m| (m.content_type, m.files.iter().map(|f| f.relative_path.as_str()).collect::<Vec<_>>()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (ContentType::GameClient, vec!["generals.exe"]),
                (ContentType::Addon, vec!["hotkeys.ini"]),
                (ContentType::Patch, vec!["patch.dll"]),
            ]
        );
        let ids: std::collections::HashSet<_> = manifests.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert!(manifests[0].files[0].is_executable);
    }

    #[tokio::test]
    async fn test_client_executables_at_two_depths_keep_distinct_paths() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("backup")).unwrap();
        std::fs::write(dir.path().join("backup").join("generals.exe"), b"old").unwrap();
        std::fs::write(dir.path().join("generals.exe"), b"new").unwrap();
        std::fs::write(dir.path().join("patch.dll"), b"dll").unwrap();

        let manifests = CommunityContentFactory::new()
            .create_manifests_from_extracted_content(&original(None), dir.path(), &CancellationToken::new())
            .await
            .unwrap();

        let client = manifests
            .iter()
            .find(|m| m.content_type == ContentType::GameClient)
            .unwrap();
        let mut paths: Vec<_> = client.files.iter().map(|f| f.relative_path.as_str()).collect();
        paths.sort();
        assert_eq!(paths, vec!["backup/generals.exe", "generals.exe"]);
    }

    #[tokio::test]
    async fn test_missing_directory_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let manifests = CommunityContentFactory::new()
            .create_manifests_from_extracted_content(&original(None), &dir.path().join("gone"), &CancellationToken::new())
            .await
            .unwrap();
        assert!(manifests.is_empty());
    }
}
