//! Content providers: one discoverer, one resolver and one deliverer per source
//!
//! Components are looked up by id when the provider is built, so a provider
//! definition naming a component nobody registered fails at startup.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::{ContentError, ProgressCallback, ProviderDefinition, Result};
use crate::delivery::ContentDeliverer;
use crate::discovery::ContentDiscoverer;
use crate::model::{ContentManifest, ContentSearchQuery, ContentSearchResult, DiscoveryPage, MAX_TAKE};
use crate::orchestrator::validation::validate_manifest_structure;
use crate::resolution::{ContentResolver, ResolverRegistry};

#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Matches `ContentSearchResult::provider_name`
    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool;

    async fn search(&self, query: &ContentSearchQuery, cancel: &CancellationToken) -> Result<DiscoveryPage>;

    /// Resolve a discovered item and check the manifest's structure
    async fn get_validated_content(
        &self,
        item: &ContentSearchResult,
        cancel: &CancellationToken,
    ) -> Result<ContentManifest>;

    /// Find `content_id` through discovery, then resolve it
    async fn get_validated_content_by_id(&self, content_id: &str, cancel: &CancellationToken) -> Result<ContentManifest>;

    /// Deliver `manifest` into `target_dir`
    async fn prepare_content(
        &self,
        manifest: &ContentManifest,
        target_dir: &Path,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<ContentManifest>;
}

/// Every discoverer, resolver and deliverer available to provider definitions
#[derive(Default, Clone)]
pub struct ComponentRegistry {
    discoverers: Vec<Arc<dyn ContentDiscoverer>>,
    resolvers: ResolverRegistry,
    deliverers: Vec<Arc<dyn ContentDeliverer>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_discoverer(mut self, discoverer: Arc<dyn ContentDiscoverer>) -> Self {
        self.discoverers.push(discoverer);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ContentResolver>) -> Self {
        self.resolvers.register(resolver);
        self
    }

    pub fn with_deliverer(mut self, deliverer: Arc<dyn ContentDeliverer>) -> Self {
        self.deliverers.push(deliverer);
        self
    }

    pub fn discoverer(&self, name: &str) -> Option<Arc<dyn ContentDiscoverer>> {
        self.discoverers.iter().find(|d| d.name().eq_ignore_ascii_case(name)).cloned()
    }

    pub fn resolver(&self, resolver_id: &str) -> Option<Arc<dyn ContentResolver>> {
        self.resolvers.get(resolver_id)
    }

    pub fn deliverer(&self, name: &str) -> Option<Arc<dyn ContentDeliverer>> {
        self.deliverers.iter().find(|d| d.name().eq_ignore_ascii_case(name)).cloned()
    }

    pub fn resolvers(&self) -> &ResolverRegistry {
        &self.resolvers
    }
}

fn missing_component(definition: &ProviderDefinition, kind: &str, field: &str, id: &str) -> ContentError {
    ContentError::Configuration {
        message: format!("provider '{}' needs {} '{}' which is not registered", definition.provider_id, kind, id),
        field: Some(field.to_string()),
        suggestion: Some(format!("Register a {} named '{}' before building providers", kind, id)),
    }
}

/// Provider assembled from a definition and registered components
pub struct ComposedContentProvider {
    definition: ProviderDefinition,
    enabled: AtomicBool,
    discoverer: Arc<dyn ContentDiscoverer>,
    resolver: Arc<dyn ContentResolver>,
    deliverer: Arc<dyn ContentDeliverer>,
}

impl std::fmt::Debug for ComposedContentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedContentProvider")
            .field("provider_id", &self.definition.provider_id)
            .field("discoverer", &self.discoverer.name())
            .field("resolver", &self.resolver.resolver_id())
            .field("deliverer", &self.deliverer.name())
            .finish()
    }
}

impl ComposedContentProvider {
    pub fn new(definition: ProviderDefinition, registry: &ComponentRegistry) -> Result<Self> {
        definition.validate()?;

        let discoverer = registry
            .discoverer(&definition.discoverer_id)
            .ok_or_else(|| missing_component(&definition, "discoverer", "discovererId", &definition.discoverer_id))?;
        let resolver = registry
            .resolver(&definition.resolver_id)
            .ok_or_else(|| missing_component(&definition, "resolver", "resolverId", &definition.resolver_id))?;
        let deliverer = registry
            .deliverer(&definition.deliverer_id)
            .ok_or_else(|| missing_component(&definition, "deliverer", "delivererId", &definition.deliverer_id))?;

        info!(
            "Provider '{}' uses discoverer '{}', resolver '{}', deliverer '{}'",
            definition.provider_id,
            discoverer.name(),
            resolver.resolver_id(),
            deliverer.name()
        );
        Ok(Self {
            enabled: AtomicBool::new(definition.enabled),
            definition,
            discoverer,
            resolver,
            deliverer,
        })
    }

    pub fn definition(&self) -> &ProviderDefinition {
        &self.definition
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }
}

#[async_trait]
impl ContentProvider for ComposedContentProvider {
    fn name(&self) -> &str {
        &self.definition.provider_id
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    async fn search(&self, query: &ContentSearchQuery, cancel: &CancellationToken) -> Result<DiscoveryPage> {
        self.discoverer.discover(query, cancel).await
    }

    async fn get_validated_content(
        &self,
        item: &ContentSearchResult,
        cancel: &CancellationToken,
    ) -> Result<ContentManifest> {
        let manifest = self.resolver.resolve(item, cancel).await?;
        validate_manifest_structure(&manifest).into_result()?;
        debug!("Resolved '{}' to manifest {}", item.name, manifest.id);
        Ok(manifest)
    }

    async fn get_validated_content_by_id(&self, content_id: &str, cancel: &CancellationToken) -> Result<ContentManifest> {
        let query = ContentSearchQuery::new().with_skip_take(0, MAX_TAKE);
        let page = self.search(&query, cancel).await?;
        let item = page
            .items
            .into_iter()
            .find(|item| item.id.eq_ignore_ascii_case(content_id))
            .ok_or_else(|| ContentError::Resolution {
                content_id: content_id.to_string(),
                reason: format!("'{}' did not discover this content", self.name()),
            })?;
        self.get_validated_content(&item, cancel).await
    }

    async fn prepare_content(
        &self,
        manifest: &ContentManifest,
        target_dir: &Path,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<ContentManifest> {
        if !self.deliverer.can_deliver(manifest) {
            return Err(ContentError::Delivery {
                manifest_id: manifest.id.clone(),
                reason: format!("deliverer '{}' cannot deliver this manifest", self.deliverer.name()),
            });
        }
        self.deliverer.deliver(manifest, target_dir, progress, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::LocalContentDeliverer;
    use crate::discovery::FileSystemDiscoverer;
    use crate::model::{ContentManifestBuilder, ManifestFile, SearchPayload};
    use crate::resolution::LocalManifestResolver;
    use crate::services::JsonManifestDiscovery;
    use tempfile::TempDir;

    fn registry(dir: &Path) -> ComponentRegistry {
        ComponentRegistry::new()
            .with_discoverer(Arc::new(FileSystemDiscoverer::new(
                "local",
                Arc::new(JsonManifestDiscovery::new()),
                vec![dir.to_path_buf()],
            )))
            .with_resolver(Arc::new(LocalManifestResolver::new()))
            .with_deliverer(Arc::new(LocalContentDeliverer::new()))
    }

    #[test]
    fn test_missing_component_fails_construction() {
        let dir = TempDir::new().unwrap();
        let definition = ProviderDefinition::new("local", "filesystem", "local", "archive");
        let error = ComposedContentProvider::new(definition, &registry(dir.path())).unwrap_err();
        assert!(matches!(error, ContentError::Configuration { field: Some(ref f), .. } if f == "delivererId"));
    }

    #[tokio::test]
    async fn test_validated_content_and_prepare() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("data.big");
        std::fs::write(&source, b"big").unwrap();

        let definition = ProviderDefinition::new("local", "filesystem", "local", "local");
        let provider = ComposedContentProvider::new(definition, &registry(dir.path())).unwrap();
        assert!(provider.is_enabled());

        let manifest = ContentManifestBuilder::new()
            .with_basic_info("Shockwave", "1.2")
            .add_file(ManifestFile::extracted("data.big", source, 3))
            .build()
            .unwrap();
        let mut item = ContentSearchResult::new(manifest.id.clone(), "Shockwave", "local");
        item.data = SearchPayload::Manifest(Box::new(manifest.clone()));

        let cancel = CancellationToken::new();
        let resolved = provider.get_validated_content(&item, &cancel).await.unwrap();
        assert_eq!(resolved.id, manifest.id);

        let target = dir.path().join("staging");
        provider.prepare_content(&resolved, &target, None, &cancel).await.unwrap();
        assert!(target.join("data.big").exists());

        let mut remote = resolved.clone();
        remote.files[0] = ManifestFile::remote("data.big", "https://x.example/data.big", 3);
        assert!(matches!(
            provider.prepare_content(&remote, &target, None, &cancel).await,
            Err(ContentError::Delivery { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_id_is_a_resolution_error() {
        let dir = TempDir::new().unwrap();
        let definition = ProviderDefinition::new("local", "filesystem", "local", "local");
        let provider = ComposedContentProvider::new(definition, &registry(dir.path())).unwrap();

        let result = provider.get_validated_content_by_id("1.0.nobody.mod.nothing", &CancellationToken::new()).await;
        assert!(matches!(result, Err(ContentError::Resolution { .. })));
    }
}
