//! Data model shared across discovery, resolution and delivery

pub mod builder;
pub mod manifest;
pub mod payload;
pub mod search;
pub mod types;
pub mod version;

pub use builder::ContentManifestBuilder;
pub use manifest::{
    generate_publisher_content_id, normalize_id_segment, normalize_relative_path, ContentDependency,
    ContentManifest, ContentMetadata, InstallationInstructions, ManifestFile, PublisherInfo,
    MANIFEST_SCHEMA_VERSION,
};
pub use payload::{GitHubAsset, GitHubOwner, GitHubRelease, GitHubRepository, GitHubSearchResponse, SearchPayload};
pub use search::{
    ContentSearchQuery, ContentSearchResult, DiscoveryPage, ProviderSearchError, SearchOutcome, MAX_TAKE,
};
pub use types::{
    ArchiveKind, ContentSortOrder, ContentSourceType, ContentType, DependencyInstallBehavior, GameType,
    InstallTarget, PublisherType, WorkspaceStrategy,
};
pub use version::{extract_manifest_version, extract_run_number, is_newer_version, manifest_version_number};
