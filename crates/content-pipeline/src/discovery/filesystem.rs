//! Discoverer over manifests already sitting in local content directories

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::core::Result;
use crate::discovery::ContentDiscoverer;
use crate::model::{
    ContentManifest, ContentSearchQuery, ContentSearchResult, ContentSourceType, DiscoveryPage, SearchPayload,
};
use crate::services::{DiscoveredManifest, ManifestDiscovery};

/// Resolver id stamped on local results
pub const LOCAL_RESOLVER_ID: &str = "local";

pub struct FileSystemDiscoverer {
    name: String,
    provider_id: String,
    discovery: Arc<dyn ManifestDiscovery>,
    directories: Vec<PathBuf>,
}

impl FileSystemDiscoverer {
    pub fn new<S: Into<String>>(provider_id: S, discovery: Arc<dyn ManifestDiscovery>, directories: Vec<PathBuf>) -> Self {
        Self {
            name: "filesystem".to_string(),
            provider_id: provider_id.into(),
            discovery,
            directories,
        }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn add_directory<P: Into<PathBuf>>(mut self, directory: P) -> Self {
        self.directories.push(directory.into());
        self
    }

    fn to_result(&self, found: DiscoveredManifest) -> ContentSearchResult {
        let manifest = anchor_files(found.manifest, &found.content_dir);

        let mut result = ContentSearchResult::new(manifest.id.clone(), manifest.name.clone(), self.provider_id.clone());
        result.description = manifest.metadata.description.clone();
        result.version = manifest.version.clone();
        result.content_type = manifest.content_type;
        result.target_game = manifest.target_game;
        result.author_name = manifest.publisher.name.clone();
        result.icon_url = manifest.metadata.icon_url.clone();
        result.add_tags(&manifest.metadata.tags);
        result.download_size = Some(manifest.total_size());
        result.last_updated = manifest.metadata.release_date;
        result.source_url = Some(found.manifest_path.display().to_string());
        result.requires_resolution = false;
        result.resolver_id = Some(LOCAL_RESOLVER_ID.to_string());
        result.data = SearchPayload::Manifest(Box::new(manifest));
        result
    }
}

/// Point every file at its absolute location below `content_dir`
fn anchor_files(mut manifest: ContentManifest, content_dir: &std::path::Path) -> ContentManifest {
    for file in &mut manifest.files {
        let path = match file.source_path.take() {
            Some(path) if path.is_absolute() => path,
            Some(path) => content_dir.join(path),
            None => content_dir.join(&file.relative_path),
        };
        file.source_path = Some(path);
        file.transition_source_type(ContentSourceType::ExtractedPackage);
    }
    manifest
}

#[async_trait]
impl ContentDiscoverer for FileSystemDiscoverer {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Manifests found in local content directories"
    }

    async fn discover(&self, query: &ContentSearchQuery, cancel: &CancellationToken) -> Result<DiscoveryPage> {
        let found = self.discovery.discover_manifests(&self.directories, cancel).await?;
        let total = found.len();

        let items: Vec<_> = found
            .into_iter()
            .map(|m| self.to_result(m))
            .filter(|item| query.matches(item))
            .collect();
        info!("Local content: {} of {} manifest(s) match the query", items.len(), total);

        Ok(DiscoveryPage::new(items, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentManifestBuilder, ContentType, GameType, ManifestFile};
    use crate::services::{JsonManifestDiscovery, MANIFEST_FILE_SUFFIX};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_manifests_become_resolved_results() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("shockwave");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("data.big"), b"big").unwrap();

        let manifest = ContentManifestBuilder::new()
            .with_basic_info("ShockWave", "1.2")
            .with_content_type(ContentType::Mod, GameType::ZeroHour)
            .with_description("Expanded faction mod")
            .add_file(ManifestFile {
                relative_path: "data.big".to_string(),
                size: 3,
                ..Default::default()
            })
            .build()
            .unwrap();
        std::fs::write(
            dir.join(format!("shockwave{}", MANIFEST_FILE_SUFFIX)),
            serde_json::to_string(&manifest).unwrap(),
        )
        .unwrap();

        let discoverer = FileSystemDiscoverer::new("local", Arc::new(JsonManifestDiscovery::new()), vec![])
            .add_directory(root.path())
            .add_directory(root.path().join("missing"));

        let page = discoverer
            .discover(&ContentSearchQuery::new().with_search_term("faction"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(page.items.len(), 1);
        let item = &page.items[0];
        assert!(!item.requires_resolution);
        assert_eq!(item.id, manifest.id);
        let embedded = item.data.manifest().unwrap();
        assert_eq!(embedded.files[0].source_path.as_deref(), Some(dir.join("data.big").as_path()));
        assert_eq!(embedded.files[0].source_type, ContentSourceType::ExtractedPackage);
    }
}
