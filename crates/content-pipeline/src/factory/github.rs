//! Manifest factory for GitHub release archives
//!
//! Game client releases are often bundles: the client plus hotkeys, control
//! bars and patch files, sometimes for both games side by side in `CCG/` and
//! `ZH/`. Those are bucketed per game. Releases of any other content type
//! describe one piece of content and stay a single manifest.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::Result;
use crate::factory::{bucketed_manifests, locate_content_root, scan_and_hash, single_content_manifest, ManifestFactory};
use crate::model::{ContentManifest, ContentType, GameType, PublisherType};

#[derive(Debug, Default, Clone, Copy)]
pub struct GitHubContentFactory;

impl GitHubContentFactory {
    pub fn new() -> Self {
        Self
    }
}

/// Game folders present directly below the extraction root
fn game_folders(extracted_dir: &Path) -> Vec<(GameType, PathBuf)> {
    let Ok(entries) = std::fs::read_dir(extracted_dir) else {
        return Vec::new();
    };
    let dirs: Vec<PathBuf> = entries.flatten().map(|e| e.path()).filter(|p| p.is_dir()).collect();

    [GameType::Generals, GameType::ZeroHour]
        .into_iter()
        .filter_map(|game| {
            let folder = game.archive_folder()?;
            dirs.iter()
                .find(|d| d.file_name().is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case(folder)))
                .map(|d| (game, d.clone()))
        })
        .collect()
}

#[async_trait]
impl ManifestFactory for GitHubContentFactory {
    fn name(&self) -> &str {
        "github"
    }

    fn can_handle(&self, manifest: &ContentManifest) -> bool {
        manifest.publisher.publisher_type == PublisherType::GitHub
    }

    async fn create_manifests_from_extracted_content(
        &self,
        original: &ContentManifest,
        extracted_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentManifest>> {
        if original.metadata.identity_marker.is_some() || original.content_type != ContentType::GameClient {
            let root = self.get_manifest_directory(original, extracted_dir);
            let files = scan_and_hash(&root, cancel).await?;
            return Ok(single_content_manifest(original, &files)?.into_iter().collect());
        }

        let folders = game_folders(extracted_dir);
        if folders.len() < 2 {
            let root = self.get_manifest_directory(original, extracted_dir);
            let files = scan_and_hash(&root, cancel).await?;
            return bucketed_manifests(original, original.target_game, &files);
        }

        let mut manifests = Vec::new();
        for (game, folder) in folders {
            let files = scan_and_hash(&folder, cancel).await?;
            debug!("{} holds {} file(s) for {:?}", folder.display(), files.len(), game);

            let mut scoped = original.clone();
            scoped.name = format!("{} {}", original.name, game.archive_folder().unwrap_or_default());
            manifests.extend(bucketed_manifests(&scoped, game, &files)?);
        }
        Ok(manifests)
    }

    fn get_manifest_directory(&self, manifest: &ContentManifest, extracted_dir: &Path) -> PathBuf {
        locate_content_root(manifest.target_game, extracted_dir)
    }
}
