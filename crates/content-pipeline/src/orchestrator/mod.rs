//! Content orchestrator: fan-out search and end-to-end acquisition
//!
//! The orchestrator owns the provider and resolver registries, the search
//! and manifest caches, and the staging area used while content is
//! delivered and validated before it reaches the manifest pool.

use std::cmp::Ordering as CmpOrdering;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::{
    monotonic, report, AcquisitionPhase, ContentError, FileOperation, PipelineConfig, ProgressCallback, Result,
};
use crate::delivery::close_scratch;
use crate::model::{
    is_newer_version, ContentManifest, ContentSearchQuery, ContentSearchResult, ContentSortOrder,
    ProviderSearchError, SearchOutcome,
};
use crate::provider::ContentProvider;
use crate::resolution::{ContentResolver, ResolverRegistry};
use crate::services::{ContentManifestPool, FileHashProvider};

pub mod cache;
pub mod metrics;
pub mod validation;

pub use cache::TtlCache;
pub use metrics::{OrchestratorMetrics, OrchestratorMetricsSnapshot};
pub use validation::{
    fill_missing_hashes, validate_manifest_structure, ContentValidator, IssueSeverity, ValidationIssue,
    ValidationReport,
};

pub struct ContentOrchestrator {
    providers: Mutex<Vec<Arc<dyn ContentProvider>>>,
    resolvers: Mutex<ResolverRegistry>,
    pool: Arc<dyn ContentManifestPool>,
    validator: ContentValidator,
    search_cache: TtlCache<String, SearchOutcome>,
    manifest_cache: TtlCache<String, ContentManifest>,
    metrics: OrchestratorMetrics,
    staging_root: PathBuf,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// File-name-safe form of a manifest id
fn staging_prefix(manifest_id: &str) -> String {
    let safe: String = manifest_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    format!("{}-", safe.trim_matches('.'))
}

fn compare_results(order: ContentSortOrder, a: &ContentSearchResult, b: &ContentSearchResult) -> CmpOrdering {
    match order {
        ContentSortOrder::Relevance => CmpOrdering::Equal,
        ContentSortOrder::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        ContentSortOrder::DateUpdated => b.last_updated.cmp(&a.last_updated),
        ContentSortOrder::DownloadCount => b.download_count.cmp(&a.download_count),
        ContentSortOrder::Rating => b
            .rating
            .unwrap_or(0.0)
            .partial_cmp(&a.rating.unwrap_or(0.0))
            .unwrap_or(CmpOrdering::Equal),
    }
}

impl ContentOrchestrator {
    pub fn new(
        config: &PipelineConfig,
        pool: Arc<dyn ContentManifestPool>,
        hasher: Arc<dyn FileHashProvider>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            providers: Mutex::new(Vec::new()),
            resolvers: Mutex::new(ResolverRegistry::new()),
            pool,
            validator: ContentValidator::new(config.max_concurrent_validations, hasher),
            search_cache: TtlCache::new(config.search_cache_ttl),
            manifest_cache: TtlCache::new(config.manifest_cache_ttl),
            metrics: OrchestratorMetrics::default(),
            staging_root: config.staging_root.clone(),
        })
    }

    /// Register a provider; a name already taken is refused with a warning
    pub fn add_provider(&self, provider: Arc<dyn ContentProvider>) -> Result<bool> {
        if provider.name().trim().is_empty() {
            return Err(ContentError::Configuration {
                message: "provider name is empty".to_string(),
                field: Some("providerId".to_string()),
                suggestion: None,
            });
        }

        let mut providers = lock(&self.providers);
        if providers.iter().any(|p| p.name().eq_ignore_ascii_case(provider.name())) {
            warn!("Provider '{}' is already registered, ignoring duplicate", provider.name());
            return Ok(false);
        }
        info!("Registered provider '{}'", provider.name());
        providers.push(provider);
        Ok(true)
    }

    /// Returns whether a provider was removed
    pub fn remove_provider(&self, name: &str) -> bool {
        let mut providers = lock(&self.providers);
        let before = providers.len();
        let kept: Vec<_> = providers.drain(..).filter(|p| !p.name().eq_ignore_ascii_case(name)).collect();
        *providers = kept;
        let removed = providers.len() != before;
        if removed {
            info!("Removed provider '{}'", name);
        }
        removed
    }

    pub fn provider(&self, name: &str) -> Option<Arc<dyn ContentProvider>> {
        lock(&self.providers).iter().find(|p| p.name().eq_ignore_ascii_case(name)).cloned()
    }

    pub fn provider_names(&self) -> Vec<String> {
        lock(&self.providers).iter().map(|p| p.name().to_string()).collect()
    }

    pub fn enabled_providers(&self) -> Vec<Arc<dyn ContentProvider>> {
        lock(&self.providers).iter().filter(|p| p.is_enabled()).cloned().collect()
    }

    /// First registration of a resolver id wins
    pub fn register_resolver(&self, resolver: Arc<dyn ContentResolver>) -> bool {
        lock(&self.resolvers).register(resolver)
    }

    pub fn resolver(&self, resolver_id: &str) -> Option<Arc<dyn ContentResolver>> {
        lock(&self.resolvers).get(resolver_id)
    }

    pub fn metrics(&self) -> OrchestratorMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn invalidate_cache(&self) {
        self.search_cache.clear();
        self.manifest_cache.clear();
        debug!("Search and manifest caches cleared");
    }

    /// Search every enabled provider concurrently and merge the results
    pub async fn search(&self, query: &ContentSearchQuery, cancel: &CancellationToken) -> Result<SearchOutcome> {
        query.validate()?;
        self.metrics.record_search();

        let cache_key = query.cache_key();
        if let Some(cached) = self.search_cache.get(&cache_key) {
            self.metrics.record_search_cache_hit();
            debug!("Search cache hit for {}", cache_key);
            return Ok(cached);
        }

        let providers = self.enabled_providers();
        if providers.is_empty() {
            return Err(ContentError::NoEnabledProviders);
        }

        let results: Arc<Mutex<Vec<(usize, Vec<ContentSearchResult>, bool)>>> = Arc::new(Mutex::new(Vec::new()));
        let errors: Arc<Mutex<Vec<ProviderSearchError>>> = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::with_capacity(providers.len());
        for (index, provider) in providers.iter().enumerate() {
            let provider = provider.clone();
            let query = query.clone();
            let cancel = cancel.clone();
            let results = results.clone();
            let errors = errors.clone();
            handles.push(tokio::spawn(async move {
                match provider.search(&query, &cancel).await {
                    Ok(page) => {
                        debug!("Provider '{}' returned {} item(s)", provider.name(), page.items.len());
                        lock(&results).push((index, page.items, page.has_more_items));
                    }
                    Err(e) => {
                        warn!("Provider '{}' search failed: {}", provider.name(), e);
                        lock(&errors).push(ProviderSearchError {
                            provider_name: provider.name().to_string(),
                            message: e.to_string(),
                        });
                    }
                }
            }));
        }

        for (handle, provider) in futures::future::join_all(handles).await.into_iter().zip(&providers) {
            if let Err(e) = handle {
                error!("Search task for '{}' did not complete: {}", provider.name(), e);
                lock(&errors).push(ProviderSearchError {
                    provider_name: provider.name().to_string(),
                    message: format!("search task failed: {}", e),
                });
            }
        }

        let mut pages = std::mem::take(&mut *lock(&results));
        let errors = std::mem::take(&mut *lock(&errors));
        for _ in &errors {
            self.metrics.record_provider_failure();
        }
        if pages.is_empty() && !errors.is_empty() {
            return Err(ContentError::SearchFailed {
                errors: errors.iter().map(ToString::to_string).collect(),
            });
        }

        pages.sort_by_key(|(index, _, _)| *index);
        let more_remote = pages.iter().any(|(_, _, more)| *more);
        let mut items: Vec<ContentSearchResult> = pages.into_iter().flat_map(|(_, items, _)| items).collect();
        items.sort_by(|a, b| compare_results(query.sort_order, a, b));

        let total_count = items.len();
        let page: Vec<_> = items.into_iter().skip(query.skip).take(query.take).collect();
        let outcome = SearchOutcome {
            has_more_items: more_remote || query.skip + page.len() < total_count,
            items: page,
            errors,
            total_count,
        };

        if outcome.errors.is_empty() {
            self.search_cache.insert(cache_key, outcome.clone());
        }
        info!(
            "Search returned {} of {} item(s) with {} provider error(s)",
            outcome.items.len(),
            outcome.total_count,
            outcome.errors.len()
        );
        Ok(outcome)
    }

    /// Resolve through a registered resolver when the item names one, else through its provider
    pub async fn resolve(&self, item: &ContentSearchResult, cancel: &CancellationToken) -> Result<ContentManifest> {
        let registered = item.resolver_id.as_deref().and_then(|id| self.resolver(id));
        match registered {
            Some(resolver) => {
                let manifest = resolver.resolve(item, cancel).await?;
                validate_manifest_structure(&manifest).into_result()?;
                Ok(manifest)
            }
            None => {
                let provider = self.provider(&item.provider_name).ok_or_else(|| ContentError::ProviderNotFound {
                    name: item.provider_name.clone(),
                })?;
                provider.get_validated_content(item, cancel).await
            }
        }
    }

    async fn obtain_manifest(&self, item: &ContentSearchResult, cancel: &CancellationToken) -> Result<ContentManifest> {
        if let Some(manifest) = item.data.manifest() {
            return Ok(manifest.clone());
        }

        let key = format!("manifest:{}:{}", item.provider_name.to_lowercase(), item.id);
        if let Some(manifest) = self.manifest_cache.get(&key) {
            self.metrics.record_manifest_cache_hit();
            return Ok(manifest);
        }

        let manifest = self.resolve(item, cancel).await?;
        self.manifest_cache.insert(key, manifest.clone());
        Ok(manifest)
    }

    /// Resolve, deliver, validate and store one search result
    pub async fn acquire_content(
        &self,
        item: &ContentSearchResult,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<ContentManifest> {
        self.metrics.record_acquisition_started();
        let progress = progress.map(monotonic);

        let result = self.acquire_inner(item, progress.clone(), cancel).await;
        match &result {
            Ok(manifest) => {
                self.metrics.record_acquisition_succeeded();
                report(progress.as_ref(), AcquisitionPhase::Completed, 100.0, format!("Acquired {}", manifest.name));
                info!("Acquired '{}' as {}", item.name, manifest.id);
            }
            Err(e) => {
                self.metrics.record_acquisition_failed();
                error!("Acquisition of '{}' failed: {}", item.name, e);
            }
        }
        result
    }

    async fn acquire_inner(
        &self,
        item: &ContentSearchResult,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<ContentManifest> {
        report(progress.as_ref(), AcquisitionPhase::Validating, 0.0, format!("Resolving {}", item.name));
        let provider = self.provider(&item.provider_name).ok_or_else(|| ContentError::ProviderNotFound {
            name: item.provider_name.clone(),
        })?;

        let manifest = self.obtain_manifest(item, cancel).await?;
        validate_manifest_structure(&manifest).into_result()?;
        report(progress.as_ref(), AcquisitionPhase::Validating, 100.0, format!("Resolved {}", manifest.id));

        tokio::fs::create_dir_all(&self.staging_root)
            .await
            .map_err(|e| ContentError::file_system(&self.staging_root, FileOperation::CreateDir, e))?;
        let staging = tempfile::Builder::new()
            .prefix(&staging_prefix(&manifest.id))
            .tempdir_in(&self.staging_root)
            .map_err(|e| ContentError::file_system(&self.staging_root, FileOperation::CreateDir, e))?;
        debug!("Staging {} in {}", manifest.id, staging.path().display());

        let result = async {
            let mut delivered = provider
                .prepare_content(&manifest, staging.path(), progress.clone(), cancel)
                .await?;

            report(progress.as_ref(), AcquisitionPhase::Storing, 0.0, "Validating staged files");
            self.validator
                .validate_staged(&delivered, staging.path(), cancel)
                .await?
                .into_result()?;
            fill_missing_hashes(&mut delivered, staging.path(), cancel).await?;

            self.pool
                .add_manifest(&delivered, Some(staging.path()), progress.clone(), cancel)
                .await?;
            delivered.mark_content_addressable();
            Ok::<_, ContentError>(delivered)
        }
        .await;

        close_scratch(staging);
        result
    }

    /// Whether `candidate` carries a newer build than the installed manifest
    pub fn check_for_update(&self, installed: &ContentManifest, candidate: &ContentSearchResult) -> bool {
        let newer = is_newer_version(&installed.version, &candidate.version);
        if newer {
            info!("Update available for {}: {} -> {}", installed.name, installed.version, candidate.version);
        }
        newer
    }
}

#[cfg(test)]
mod tests;
