//! Resolver for GitHub releases found by the topic discoverer

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::{ContentError, ProviderDefinitionLoader, Result};
use crate::discovery::github::{is_standalone_asset, metadata_keys};
use crate::discovery::require_definition;
use crate::model::{
    ArchiveKind, ContentManifest, ContentManifestBuilder, ContentMetadata, ContentSearchResult, GitHubAsset,
    GitHubRelease, GitHubRepository, InstallTarget, ManifestFile, PublisherInfo, PublisherType, SearchPayload,
};
use crate::resolution::dependencies::dependencies_for;
use crate::resolution::ContentResolver;
use crate::services::{fetch_json, HttpFetcher, RequestHeaders};

pub struct GitHubReleaseResolver {
    id: String,
    provider_id: String,
    fetcher: Arc<dyn HttpFetcher>,
    definitions: Arc<dyn ProviderDefinitionLoader>,
}

impl GitHubReleaseResolver {
    pub fn new<S: Into<String>>(
        provider_id: S,
        fetcher: Arc<dyn HttpFetcher>,
        definitions: Arc<dyn ProviderDefinitionLoader>,
    ) -> Self {
        Self {
            id: "github".to_string(),
            provider_id: provider_id.into(),
            fetcher,
            definitions,
        }
    }

    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = id.into();
        self
    }

    /// Release payload carried by the result, or fetched again by tag
    async fn release_for(
        &self,
        item: &ContentSearchResult,
        cancel: &CancellationToken,
    ) -> Result<(GitHubRepository, GitHubRelease, Option<GitHubAsset>)> {
        if let SearchPayload::GitHubRelease { repository, release, asset } = &item.data {
            return Ok((repository.as_ref().clone(), release.as_ref().clone(), asset.clone()));
        }

        let missing = |key: &str| ContentError::Resolution {
            content_id: item.id.clone(),
            reason: format!("missing '{}' metadata", key),
        };
        let owner = item.metadata(metadata_keys::OWNER).ok_or_else(|| missing(metadata_keys::OWNER))?;
        let repo = item.metadata(metadata_keys::REPOSITORY).ok_or_else(|| missing(metadata_keys::REPOSITORY))?;
        let tag = item.metadata(metadata_keys::TAG).ok_or_else(|| missing(metadata_keys::TAG))?;

        let definition = require_definition(self.definitions.as_ref(), &self.provider_id)?;
        let api = definition
            .endpoints
            .api_url
            .as_deref()
            .unwrap_or("https://api.github.com")
            .trim_end_matches('/')
            .to_string();
        let headers: RequestHeaders = vec![("Accept".to_string(), "application/vnd.github+json".to_string())];

        let repository: GitHubRepository =
            fetch_json(self.fetcher.as_ref(), &format!("{}/repos/{}/{}", api, owner, repo), &headers, cancel).await?;
        let release: GitHubRelease = fetch_json(
            self.fetcher.as_ref(),
            &format!("{}/repos/{}/{}/releases/tags/{}", api, owner, repo, tag),
            &headers,
            cancel,
        )
        .await?;
        let asset = item
            .metadata(metadata_keys::ASSET_NAME)
            .and_then(|name| release.assets.iter().find(|a| a.name == name).cloned());
        Ok((repository, release, asset))
    }
}

fn asset_file(asset: &GitHubAsset, default_target: InstallTarget) -> ManifestFile {
    let mut file = ManifestFile::remote(asset.name.clone(), asset.browser_download_url.clone(), asset.size);
    file.is_executable = asset.name.to_ascii_lowercase().ends_with(".exe");
    file.install_target = if file.archive_kind.is_some() {
        InstallTarget::Workspace
    } else {
        crate::factory::classify::classify_install_target(&asset.name, default_target)
    };
    file
}

/// Archives when the release has any, otherwise every standalone asset
fn select_assets(release: &GitHubRelease) -> Vec<&GitHubAsset> {
    let archives: Vec<_> = release
        .assets
        .iter()
        .filter(|a| ArchiveKind::from_file_name(&a.name).is_some())
        .collect();
    if !archives.is_empty() {
        return archives;
    }
    release.assets.iter().filter(|a| is_standalone_asset(&a.name)).collect()
}

#[async_trait]
impl ContentResolver for GitHubReleaseResolver {
    fn resolver_id(&self) -> &str {
        &self.id
    }

    async fn resolve(&self, item: &ContentSearchResult, cancel: &CancellationToken) -> Result<ContentManifest> {
        let (repository, release, asset) = self.release_for(item, cancel).await?;
        let default_target = item.content_type.default_install_target();

        let files: Vec<ManifestFile> = match &asset {
            Some(asset) => vec![asset_file(asset, default_target)],
            None => select_assets(&release).into_iter().map(|a| asset_file(a, default_target)).collect(),
        };
        if files.is_empty() {
            return Err(ContentError::Resolution {
                content_id: item.id.clone(),
                reason: format!("release {} of {} has no downloadable assets", release.tag_name, repository.full_name),
            });
        }

        let publisher = PublisherInfo {
            id: repository.owner.login.clone(),
            name: repository.owner.login.clone(),
            website: Some(repository.html_url.clone()).filter(|u| !u.is_empty()),
            support_url: Some(format!("{}/issues", repository.html_url)).filter(|_| !repository.html_url.is_empty()),
            publisher_type: PublisherType::GitHub,
        };
        let metadata = ContentMetadata {
            description: item.description.clone(),
            tags: item.tags.clone(),
            icon_url: item.icon_url.clone(),
            changelog_url: Some(release.html_url.clone()).filter(|u| !u.is_empty()),
            release_date: release.published_at,
            ..Default::default()
        };

        let manifest = ContentManifestBuilder::new()
            .with_basic_info(item.name.clone(), release.tag_name.clone())
            .with_content_type(item.content_type, item.target_game)
            .with_publisher(publisher)
            .with_metadata(metadata)
            .with_dependencies(dependencies_for(item.content_type, item.target_game))
            .add_files(files)
            .build()?;

        debug!(
            "Resolved {}@{} into {} with {} file(s)",
            repository.full_name,
            release.tag_name,
            manifest.id,
            manifest.files.len()
        );
        Ok(manifest)
    }
}
