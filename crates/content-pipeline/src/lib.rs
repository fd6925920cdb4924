//! Content Pipeline Library
//!
//! Discovers, resolves, downloads and stages community content for
//! Command & Conquer: Generals and Zero Hour. Each content source is a
//! provider built from three pluggable pieces: a discoverer that lists what
//! is available, a resolver that turns a listing into a full manifest, and a
//! deliverer that puts the manifest's files on disk. The orchestrator fans
//! searches out to every provider and runs acquisitions end to end.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use content_pipeline::{
//!     AcquisitionProgress, ComponentRegistry, ComposedContentProvider, ContentOrchestrator,
//!     ContentSearchQuery, FileSystemDiscoverer, InMemoryManifestPool, JsonManifestDiscovery,
//!     LocalContentDeliverer, LocalManifestResolver, PipelineConfig, ProviderDefinition,
//!     XxHashFileHashProvider,
//! };
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> content_pipeline::Result<()> {
//! let config = PipelineConfig::default();
//! let orchestrator = ContentOrchestrator::new(
//!     &config,
//!     Arc::new(InMemoryManifestPool::new()),
//!     Arc::new(XxHashFileHashProvider::new()),
//! )?;
//!
//! // Wire a provider over manifests sitting in a local folder
//! let registry = ComponentRegistry::new()
//!     .with_discoverer(Arc::new(FileSystemDiscoverer::new(
//!         "local",
//!         Arc::new(JsonManifestDiscovery::new()),
//!         vec!["/games/content".into()],
//!     )))
//!     .with_resolver(Arc::new(LocalManifestResolver::new()))
//!     .with_deliverer(Arc::new(LocalContentDeliverer::new()));
//! let definition = ProviderDefinition::new("local", "filesystem", "local", "local");
//! orchestrator.add_provider(Arc::new(ComposedContentProvider::new(definition, &registry)?))?;
//!
//! let cancel = CancellationToken::new();
//! let results = orchestrator
//!     .search(&ContentSearchQuery::new().with_search_term("shockwave"), &cancel)
//!     .await?;
//!
//! let progress = Arc::new(|event: AcquisitionProgress| {
//!     println!("{:?} {:.0}%: {}", event.phase, event.overall_percent, event.message);
//! });
//! if let Some(item) = results.items.first() {
//!     let manifest = orchestrator.acquire_content(item, Some(progress), &cancel).await?;
//!     println!("Acquired {} ({} files)", manifest.id, manifest.files.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Catalog parsing**: Community Outpost `dl.dat` catalogs with mirror ranking
//! - **Discovery**: GitHub topics, catalogs, scraped listing pages and local folders
//! - **Resolution**: GitHub releases, catalog entries and scraped detail pages to manifests
//! - **Delivery**: Plain HTTP files, zip and 7z archives, nested GitHub release zips
//! - **Manifest factories**: Split extracted releases into one manifest per game client
//! - **Mirror fallback**: Each file tries its primary URL, then every mirror
//! - **Validation**: Structural checks before delivery, size and hash checks after
//! - **Caching**: Search and manifest caches with per-entry expiry
//! - **Progress tracking**: Monotonic phase-weighted acquisition progress

pub mod catalog;
pub mod core;
pub mod delivery;
pub mod discovery;
pub mod factory;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod provider;
pub mod resolution;
pub mod services;

// Re-export commonly used types for convenience
pub use crate::core::{
    AcquisitionPhase, AcquisitionProgress, ContentError, PipelineConfig, ProgressCallback, ProviderDefinition,
    Result,
};
pub use catalog::{Catalog, CatalogItem, CatalogParser};
pub use delivery::{
    ArchiveContentDeliverer, ContentDeliverer, GitHubZipDeliverer, HttpContentDeliverer, LocalContentDeliverer,
};
pub use discovery::{
    CommunityOutpostDiscoverer, ContentDiscoverer, FileSystemDiscoverer, GitHubTopicDiscoverer, ScrapeDiscoverer,
};
pub use factory::{CommunityContentFactory, GitHubContentFactory, ManifestFactory, ManifestFactoryRegistry};
pub use model::{
    ContentManifest, ContentManifestBuilder, ContentSearchQuery, ContentSearchResult, ContentSortOrder,
    ContentType, GameType, ManifestFile, SearchOutcome,
};
pub use orchestrator::{ContentOrchestrator, OrchestratorMetricsSnapshot};
pub use provider::{ComponentRegistry, ComposedContentProvider, ContentProvider};
pub use resolution::{
    ContentResolver, GenPatcherResolver, GitHubReleaseResolver, LocalManifestResolver, ResolverRegistry,
    ScrapeResolver,
};
pub use services::{
    ContentManifestPool, DownloadService, FileHashProvider, HttpDownloadService, InMemoryManifestPool,
    JsonManifestDiscovery, XxHashFileHashProvider,
};
