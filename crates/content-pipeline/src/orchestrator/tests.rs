//! Orchestrator tests over in-process providers

use super::*;
use crate::core::ProviderDefinition;
use crate::delivery::LocalContentDeliverer;
use crate::discovery::FileSystemDiscoverer;
use crate::model::{ContentManifestBuilder, ContentType, DiscoveryPage, ManifestFile, SearchPayload};
use crate::provider::{ComponentRegistry, ComposedContentProvider};
use crate::resolution::LocalManifestResolver;
use crate::services::{InMemoryManifestPool, JsonManifestDiscovery, XxHashFileHashProvider, MANIFEST_FILE_SUFFIX};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

/// Provider returning fixed results, or failing every search
struct StaticProvider {
    name: String,
    items: Vec<ContentSearchResult>,
    fail: bool,
    enabled: bool,
    calls: AtomicUsize,
}

impl StaticProvider {
    fn new(name: &str, names: &[&str]) -> Self {
        let items = names
            .iter()
            .map(|n| ContentSearchResult::new(format!("{}.{}", name, n), *n, name))
            .collect();
        Self {
            name: name.to_string(),
            items,
            fail: false,
            enabled: true,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(name, &[])
        }
    }
}

#[async_trait]
impl ContentProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn search(&self, _query: &ContentSearchQuery, _cancel: &CancellationToken) -> Result<crate::model::DiscoveryPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ContentError::Parse {
                context: self.name.clone(),
                message: "listing page changed".to_string(),
            });
        }
        Ok(DiscoveryPage::new(self.items.clone(), false))
    }

    async fn get_validated_content(&self, item: &ContentSearchResult, _cancel: &CancellationToken) -> Result<ContentManifest> {
        Err(ContentError::Resolution {
            content_id: item.id.clone(),
            reason: "not resolvable".to_string(),
        })
    }

    async fn get_validated_content_by_id(&self, content_id: &str, _cancel: &CancellationToken) -> Result<ContentManifest> {
        Err(ContentError::Resolution {
            content_id: content_id.to_string(),
            reason: "not resolvable".to_string(),
        })
    }

    async fn prepare_content(
        &self,
        manifest: &ContentManifest,
        _target_dir: &Path,
        _progress: Option<ProgressCallback>,
        _cancel: &CancellationToken,
    ) -> Result<ContentManifest> {
        Ok(manifest.clone())
    }
}

fn orchestrator(staging_root: &Path) -> (ContentOrchestrator, Arc<InMemoryManifestPool>) {
    let config = PipelineConfig::builder()
        .staging_root(staging_root)
        .search_cache_ttl(Duration::from_secs(60))
        .build()
        .unwrap();
    let pool = Arc::new(InMemoryManifestPool::new());
    let orchestrator = ContentOrchestrator::new(&config, pool.clone(), Arc::new(XxHashFileHashProvider::new())).unwrap();
    (orchestrator, pool)
}

fn names(outcome: &SearchOutcome) -> Vec<&str> {
    outcome.items.iter().map(|i| i.name.as_str()).collect()
}

#[tokio::test]
async fn test_failing_provider_does_not_abort_the_others() {
    let dir = TempDir::new().unwrap();
    let (orchestrator, _) = orchestrator(dir.path());
    orchestrator.add_provider(Arc::new(StaticProvider::new("one", &["Alpha"]))).unwrap();
    orchestrator.add_provider(Arc::new(StaticProvider::failing("two"))).unwrap();
    orchestrator.add_provider(Arc::new(StaticProvider::new("three", &["Gamma"]))).unwrap();

    let outcome = orchestrator.search(&ContentSearchQuery::new(), &CancellationToken::new()).await.unwrap();

    assert_eq!(names(&outcome), vec!["Alpha", "Gamma"]);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].provider_name, "two");
    assert_eq!(orchestrator.metrics().provider_failures, 1);
}

#[tokio::test]
async fn test_all_providers_failing_is_a_failure() {
    let dir = TempDir::new().unwrap();
    let (orchestrator, _) = orchestrator(dir.path());

    let result = orchestrator.search(&ContentSearchQuery::new(), &CancellationToken::new()).await;
    assert!(matches!(result, Err(ContentError::NoEnabledProviders)));

    orchestrator.add_provider(Arc::new(StaticProvider::failing("a"))).unwrap();
    orchestrator.add_provider(Arc::new(StaticProvider::failing("b"))).unwrap();
    let result = orchestrator.search(&ContentSearchQuery::new(), &CancellationToken::new()).await;
    assert!(matches!(result, Err(ContentError::SearchFailed { errors }) if errors.len() == 2));
}

#[tokio::test]
async fn test_disabled_providers_are_skipped() {
    let dir = TempDir::new().unwrap();
    let (orchestrator, _) = orchestrator(dir.path());
    orchestrator
        .add_provider(Arc::new(StaticProvider {
            enabled: false,
            ..StaticProvider::new("off", &["Hidden"])
        }))
        .unwrap();

    let result = orchestrator.search(&ContentSearchQuery::new(), &CancellationToken::new()).await;
    assert!(matches!(result, Err(ContentError::NoEnabledProviders)));
}

#[tokio::test]
async fn test_sorting_pagination_and_cache() {
    let dir = TempDir::new().unwrap();
    let (orchestrator, _) = orchestrator(dir.path());
    let provider = Arc::new(StaticProvider::new("one", &["Delta", "alpha", "Charlie", "Bravo"]));
    orchestrator.add_provider(provider.clone()).unwrap();
    let cancel = CancellationToken::new();

    let relevance = orchestrator.search(&ContentSearchQuery::new(), &cancel).await.unwrap();
    assert_eq!(names(&relevance), vec!["Delta", "alpha", "Charlie", "Bravo"]);

    let query = ContentSearchQuery::new()
        .with_sort_order(ContentSortOrder::Name)
        .with_skip_take(1, 2);
    let sorted = orchestrator.search(&query, &cancel).await.unwrap();
    assert_eq!(names(&sorted), vec!["Bravo", "Charlie"]);
    assert_eq!(sorted.total_count, 4);
    assert!(sorted.has_more_items);

    let again = orchestrator.search(&query, &cancel).await.unwrap();
    assert_eq!(names(&again), names(&sorted));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    assert_eq!(orchestrator.metrics().search_cache_hits, 1);

    orchestrator.invalidate_cache();
    orchestrator.search(&query, &cancel).await.unwrap();
    assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_take_out_of_range_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (orchestrator, _) = orchestrator(dir.path());
    let query = ContentSearchQuery::new().with_skip_take(0, 0);
    let error = assert_err!(orchestrator.search(&query, &CancellationToken::new()).await);
    assert!(matches!(error, ContentError::InvalidQuery { .. }));
}

#[test]
fn test_provider_registry() {
    let dir = TempDir::new().unwrap();
    let (orchestrator, _) = orchestrator(dir.path());
    assert!(orchestrator.add_provider(Arc::new(StaticProvider::new("one", &[]))).unwrap());
    assert!(!orchestrator.add_provider(Arc::new(StaticProvider::new("ONE", &[]))).unwrap());
    assert!(orchestrator.add_provider(Arc::new(StaticProvider::new("two", &[]))).unwrap());
    assert!(orchestrator.add_provider(Arc::new(StaticProvider::new(" ", &[]))).is_err());

    assert!(orchestrator.remove_provider("one"));
    assert!(!orchestrator.remove_provider("one"));
    assert_eq!(orchestrator.provider_names(), vec!["two"]);

    assert!(orchestrator.register_resolver(Arc::new(LocalManifestResolver::new())));
    assert!(!orchestrator.register_resolver(Arc::new(LocalManifestResolver::new())));
}

#[test]
fn test_update_check_uses_run_numbers() {
    let dir = TempDir::new().unwrap();
    let (orchestrator, _) = orchestrator(dir.path());
    let installed = ContentManifestBuilder::new()
        .with_basic_info("GeneralsOnline", "0.0.640-pr241")
        .build()
        .unwrap();

    let mut candidate = ContentSearchResult::new("x", "GeneralsOnline", "github");
    candidate.version = "0.0.641-pr241".to_string();
    assert!(orchestrator.check_for_update(&installed, &candidate));

    candidate.version = "0.0.640-pr241".to_string();
    assert!(!orchestrator.check_for_update(&installed, &candidate));
}

fn write_local_content(root: &Path) -> ContentManifest {
    let content_dir = root.join("shockwave");
    std::fs::create_dir_all(content_dir.join("Data")).unwrap();
    std::fs::write(content_dir.join("Data").join("shockwave.big"), b"bigdata").unwrap();

    let manifest = ContentManifestBuilder::new()
        .with_basic_info("Shockwave", "1.2")
        .with_content_type(ContentType::Mod, crate::model::GameType::ZeroHour)
        .add_file(ManifestFile::extracted("Data/shockwave.big", "Data/shockwave.big".into(), 7))
        .build()
        .unwrap();
    std::fs::write(
        content_dir.join(format!("shockwave{}", MANIFEST_FILE_SUFFIX)),
        serde_json::to_string_pretty(&manifest).unwrap(),
    )
    .unwrap();
    manifest
}

fn local_provider(content_root: &Path) -> Arc<ComposedContentProvider> {
    let registry = ComponentRegistry::new()
        .with_discoverer(Arc::new(FileSystemDiscoverer::new(
            "local",
            Arc::new(JsonManifestDiscovery::new()),
            vec![content_root.to_path_buf()],
        )))
        .with_resolver(Arc::new(LocalManifestResolver::new()))
        .with_deliverer(Arc::new(LocalContentDeliverer::new()));
    let definition = ProviderDefinition::new("local", "filesystem", "local", "local");
    Arc::new(ComposedContentProvider::new(definition, &registry).unwrap())
}

#[tokio::test]
async fn test_acquire_local_content_end_to_end() {
    let content = TempDir::new().unwrap();
    let staging = TempDir::new().unwrap();
    let manifest = write_local_content(content.path());

    let (orchestrator, pool) = orchestrator(staging.path());
    orchestrator.add_provider(local_provider(content.path())).unwrap();
    let cancel = CancellationToken::new();

    let outcome = orchestrator.search(&ContentSearchQuery::new(), &cancel).await.unwrap();
    assert_eq!(outcome.items.len(), 1);

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let progress: ProgressCallback = Arc::new(move |event: crate::core::AcquisitionProgress| {
        sink.lock().unwrap().push((event.phase, event.overall_percent));
    });

    let acquired = assert_ok!(orchestrator.acquire_content(&outcome.items[0], Some(progress), &cancel).await);

    assert_eq!(acquired.id, manifest.id);
    assert!(acquired.files[0].hash.is_some());
    assert!(pool.get_manifest(&manifest.id).await.unwrap().is_some());
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);

    let events = events.lock().unwrap();
    assert!(events.windows(2).all(|w| w[0].1 <= w[1].1));
    assert_eq!(events.last().map(|e| e.0), Some(AcquisitionPhase::Completed));
    assert_eq!(orchestrator.metrics().acquisitions_succeeded, 1);
}

#[tokio::test]
async fn test_failed_acquisition_still_cleans_staging() {
    let content = TempDir::new().unwrap();
    let staging = TempDir::new().unwrap();
    write_local_content(content.path());

    let (orchestrator, pool) = orchestrator(staging.path());
    orchestrator.add_provider(local_provider(content.path())).unwrap();
    let cancel = CancellationToken::new();

    let outcome = orchestrator.search(&ContentSearchQuery::new(), &cancel).await.unwrap();
    std::fs::remove_file(content.path().join("shockwave").join("Data").join("shockwave.big")).unwrap();

    let result = orchestrator.acquire_content(&outcome.items[0], None, &cancel).await;
    assert!(matches!(result, Err(ContentError::Delivery { .. })));
    assert!(pool.is_empty().await);
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
    assert_eq!(orchestrator.metrics().acquisitions_failed, 1);
}

#[tokio::test]
async fn test_unknown_provider_fails_acquisition() {
    let dir = TempDir::new().unwrap();
    let (orchestrator, _) = orchestrator(dir.path());
    let mut item = ContentSearchResult::new("id", "Orphan", "nobody");
    item.data = SearchPayload::None;

    let result = orchestrator.acquire_content(&item, None, &CancellationToken::new()).await;
    assert!(matches!(result, Err(ContentError::ProviderNotFound { name }) if name == "nobody"));
}
