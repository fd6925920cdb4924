//! Manifest factories: turn an extracted tree into typed manifests
//!
//! Factories are picked by publisher type. A factory that finds nothing
//! returns an empty list; the deliverer then falls back to one generic
//! manifest over every extracted file.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::Result;
use crate::model::{
    generate_publisher_content_id, ContentManifest, ContentManifestBuilder, ContentType, GameType, ManifestFile,
};
use crate::resolution::dependencies::dependencies_for;

pub mod classify;
pub mod community;
pub mod github;

pub use classify::{
    classify_bucket, classify_install_target, common_parent, is_game_executable, scan_and_hash, ContentBucket,
    ScannedFile,
};
pub use community::CommunityContentFactory;
pub use github::GitHubContentFactory;

#[async_trait]
pub trait ManifestFactory: Send + Sync {
    fn name(&self) -> &str;

    /// Publisher match; no side effects
    fn can_handle(&self, manifest: &ContentManifest) -> bool;

    async fn create_manifests_from_extracted_content(
        &self,
        original: &ContentManifest,
        extracted_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentManifest>>;

    /// Content root inside a possibly nested extraction
    fn get_manifest_directory(&self, manifest: &ContentManifest, extracted_dir: &Path) -> PathBuf;
}

/// Factories tried in registration order
#[derive(Default, Clone)]
pub struct ManifestFactoryRegistry {
    factories: Vec<Arc<dyn ManifestFactory>>,
}

impl ManifestFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F: ManifestFactory + 'static>(mut self, factory: F) -> Self {
        self.factories.push(Arc::new(factory));
        self
    }

    /// Registry with the community and GitHub factories
    pub fn with_defaults() -> Self {
        Self::new()
            .register(CommunityContentFactory::new())
            .register(GitHubContentFactory::new())
    }

    pub fn find(&self, manifest: &ContentManifest) -> Option<Arc<dyn ManifestFactory>> {
        self.factories.iter().find(|f| f.can_handle(manifest)).cloned()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// Folder named after the target game, else the shallowest directory holding a game executable
pub fn locate_content_root(target_game: GameType, extracted_dir: &Path) -> PathBuf {
    if let Some(folder) = target_game.archive_folder() {
        if let Ok(entries) = std::fs::read_dir(extracted_dir) {
            for entry in entries.flatten() {
                if entry.path().is_dir() && entry.file_name().to_string_lossy().eq_ignore_ascii_case(folder) {
                    return entry.path();
                }
            }
        }
    }

    walkdir::WalkDir::new(extracted_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_game_executable(&e.file_name().to_string_lossy()))
        .min_by_key(|e| e.depth())
        .and_then(|e| e.path().parent().map(Path::to_path_buf))
        .unwrap_or_else(|| extracted_dir.to_path_buf())
}

fn manifest_file(file: &ScannedFile, relative_path: &str, manifest_type: ContentType) -> ManifestFile {
    let mut entry = ManifestFile::extracted(relative_path, file.absolute_path.clone(), file.size);
    entry.hash = file.hash.clone();
    entry.is_executable = relative_path.to_ascii_lowercase().ends_with(".exe");
    entry.install_target = classify_install_target(relative_path, manifest_type.default_install_target());
    entry
}

/// The resolver already knows what this is: every file belongs to the original manifest
pub fn single_content_manifest(original: &ContentManifest, files: &[ScannedFile]) -> Result<Option<ContentManifest>> {
    if files.is_empty() {
        return Ok(None);
    }

    let entries = files
        .iter()
        .map(|f| manifest_file(f, &f.relative_path, original.content_type))
        .collect::<Vec<_>>();

    let manifest = ContentManifestBuilder::new()
        .with_id(original.id.clone())
        .with_basic_info(original.name.clone(), original.version.clone())
        .with_content_type(original.content_type, original.target_game)
        .with_publisher(original.publisher.clone())
        .with_metadata(original.metadata.clone())
        .with_dependencies(original.dependencies.clone())
        .with_workspace_strategy(original.installation_instructions.workspace_strategy)
        .add_files(entries)
        .build()?;
    Ok(Some(manifest))
}

/// Bucket files by content type and build one manifest per non-empty bucket
pub fn bucketed_manifests(
    original: &ContentManifest,
    target_game: GameType,
    files: &[ScannedFile],
) -> Result<Vec<ContentManifest>> {
    let mut buckets: BTreeMap<ContentBucket, Vec<&ScannedFile>> = BTreeMap::new();
    let mut unclassified = Vec::new();
    for file in files {
        match classify_bucket(&file.relative_path) {
            Some(bucket) => buckets.entry(bucket).or_default().push(file),
            None => unclassified.push(file),
        }
    }

    // Loose files next to the shallowest game executable belong to the client
    let exe_dir = buckets
        .get(&ContentBucket::GameClient)
        .and_then(|exes| exes.iter().min_by_key(|exe| exe.relative_path.matches('/').count()))
        .map(|exe| common_parent([exe.relative_path.as_str()]));
    if let Some(exe_dir) = &exe_dir {
        let client = buckets.entry(ContentBucket::GameClient).or_default();
        for file in unclassified {
            if exe_dir.is_empty() || file.relative_path.starts_with(&format!("{}/", exe_dir)) {
                client.push(file);
            }
        }
    }

    let multiple = buckets.len() > 1;
    let mut manifests = Vec::with_capacity(buckets.len());
    for (bucket, members) in buckets {
        let content_type = bucket.content_type();
        // Every member sits below its bucket root, so stripping it keeps paths unique
        let root = common_parent(members.iter().map(|f| f.relative_path.as_str()));

        let name = if multiple {
            format!("{} {}", original.name, bucket.label())
        } else {
            original.name.clone()
        };
        let entries = members
            .iter()
            .map(|f| manifest_file(f, classify::strip_root(&f.relative_path, &root), content_type))
            .collect::<Vec<_>>();

        let mut metadata = original.metadata.clone();
        metadata.identity_marker = None;
        metadata.description = format!("{} ({} file(s) from {})", bucket.label(), entries.len(), original.name);

        let manifest = ContentManifestBuilder::new()
            .with_id(generate_publisher_content_id(
                &original.publisher.id,
                content_type,
                &name,
                original.manifest_version,
            ))
            .with_basic_info(name, original.version.clone())
            .with_content_type(content_type, target_game)
            .with_publisher(original.publisher.clone())
            .with_metadata(metadata)
            .with_dependencies(dependencies_for(content_type, target_game))
            .add_files(entries)
            .build()?;
        debug!("Bucket {:?} produced manifest {} with root '{}'", bucket, manifest.id, root);
        manifests.push(manifest);
    }
    Ok(manifests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PublisherInfo, PublisherType};
    use tempfile::TempDir;

    fn original(publisher_type: PublisherType) -> ContentManifest {
        ContentManifestBuilder::new()
            .with_basic_info("Release", "1.0")
            .with_content_type(ContentType::Mod, GameType::ZeroHour)
            .with_publisher(PublisherInfo {
                id: "owner".to_string(),
                publisher_type,
                ..Default::default()
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_registry_picks_by_publisher() {
        let registry = ManifestFactoryRegistry::with_defaults();
        assert_eq!(registry.find(&original(PublisherType::GitHub)).unwrap().name(), "github");
        assert_eq!(registry.find(&original(PublisherType::CommunityOutpost)).unwrap().name(), "communityoutpost");
        assert!(registry.find(&original(PublisherType::ModDb)).is_none());
    }

    #[test]
    fn test_locate_content_root() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("release").join("bin")).unwrap();
        std::fs::write(dir.path().join("release").join("bin").join("generals.exe"), b"x").unwrap();
        assert_eq!(locate_content_root(GameType::ZeroHour, dir.path()), dir.path().join("release").join("bin"));

        std::fs::create_dir_all(dir.path().join("zh")).unwrap();
        assert_eq!(locate_content_root(GameType::ZeroHour, dir.path()), dir.path().join("zh"));
        assert_eq!(locate_content_root(GameType::Unknown, dir.path()), dir.path().join("release").join("bin"));
    }
}
