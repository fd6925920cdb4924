//! Resolver for Community Outpost catalog entries and the community patch

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::catalog::{lookup_content_code, metadata_keys, CatalogMirror};
use crate::core::{ContentError, ProviderDefinitionLoader, Result};
use crate::discovery::require_definition;
use crate::model::{
    normalize_id_segment, ContentManifest, ContentManifestBuilder, ContentMetadata, ContentSearchResult, ContentType,
    ManifestFile, SearchPayload,
};
use crate::resolution::dependencies::{conflicts_for_code, dependencies_for};
use crate::resolution::{file_name_from_url, ContentResolver};

pub struct GenPatcherResolver {
    id: String,
    provider_id: String,
    definitions: Arc<dyn ProviderDefinitionLoader>,
}

impl GenPatcherResolver {
    pub fn new<S: Into<String>>(provider_id: S, definitions: Arc<dyn ProviderDefinitionLoader>) -> Self {
        Self {
            id: "genpatcher".to_string(),
            provider_id: provider_id.into(),
            definitions,
        }
    }

    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = id.into();
        self
    }
}

/// Ranked download URLs of a catalog item, primary first
fn ranked_urls(item: &ContentSearchResult) -> Vec<String> {
    let mirrors: Vec<CatalogMirror> = match &item.data {
        SearchPayload::CatalogItem(catalog_item) => catalog_item.mirrors.clone(),
        _ => item
            .metadata(metadata_keys::MIRRORS)
            .and_then(|json| match serde_json::from_str(json) {
                Ok(mirrors) => Some(mirrors),
                Err(e) => {
                    warn!("Ignoring unreadable mirror list of '{}': {}", item.id, e);
                    None
                }
            })
            .unwrap_or_default(),
    };

    let mut urls: Vec<String> = Vec::with_capacity(mirrors.len() + 1);
    let primary = item.metadata(metadata_keys::DOWNLOAD_URL).map(str::to_string).or_else(|| item.source_url.clone());
    for url in primary.into_iter().chain(mirrors.into_iter().map(|m| m.url)) {
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

#[async_trait]
impl ContentResolver for GenPatcherResolver {
    fn resolver_id(&self) -> &str {
        &self.id
    }

    async fn resolve(&self, item: &ContentSearchResult, cancel: &CancellationToken) -> Result<ContentManifest> {
        if cancel.is_cancelled() {
            return Err(ContentError::cancelled(format!("resolve {}", item.id)));
        }
        let definition = require_definition(self.definitions.as_ref(), &self.provider_id)?;

        let code = item.metadata(metadata_keys::CONTENT_CODE);
        let info = code.map(lookup_content_code).filter(|info| info.content_type != ContentType::Unknown);

        let (name, content_type, target_game) = match &info {
            Some(info) => (info.name.clone(), info.content_type, info.target_game),
            None => (normalize_id_segment(&item.name), item.content_type, item.target_game),
        };
        if name.is_empty() {
            return Err(ContentError::Resolution {
                content_id: item.id.clone(),
                reason: "cannot derive a content name".to_string(),
            });
        }

        let version = item
            .metadata(metadata_keys::CATALOG_VERSION)
            .map(str::to_string)
            .unwrap_or_else(|| item.version.clone());

        let mut urls = ranked_urls(item).into_iter();
        let primary = urls.next().ok_or_else(|| ContentError::Resolution {
            content_id: item.id.clone(),
            reason: "no download URL".to_string(),
        })?;
        let file_name = file_name_from_url(&primary).unwrap_or_else(|| format!("{}.zip", name));
        let size = item
            .metadata(metadata_keys::FILE_SIZE)
            .and_then(|s| s.parse().ok())
            .or(item.download_size)
            .unwrap_or(0);

        let mut file = ManifestFile::remote(file_name, primary, size);
        file.mirror_urls = urls.collect();
        file.install_target = content_type.default_install_target();

        let mut dependencies = dependencies_for(content_type, target_game);
        if let Some(code) = code {
            let conflicts = conflicts_for_code(code);
            for dependency in &mut dependencies {
                dependency.conflicts_with.extend(conflicts.iter().cloned());
            }
        }

        let metadata = ContentMetadata {
            description: item.description.clone(),
            tags: item.tags.clone(),
            icon_url: item.icon_url.clone(),
            release_date: item.last_updated,
            ..Default::default()
        };

        let mut builder = ContentManifestBuilder::new()
            .with_basic_info(name, version)
            .with_content_type(content_type, target_game)
            .with_publisher(definition.publisher_info())
            .with_metadata(metadata)
            .with_dependencies(dependencies)
            .add_file(file);
        if let Some(info) = &info {
            builder = builder.with_identity_marker(info.code.clone());
        }

        let manifest = builder.build()?;
        debug!("Resolved '{}' into manifest {}", item.name, manifest.id);
        Ok(manifest)
    }
}
