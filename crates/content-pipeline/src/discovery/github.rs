//! Discoverer over GitHub repositories tagged with community topics
//!
//! Repositories are searched topic by topic, de-duplicated by id, and their
//! latest release looked up one at a time with a pause after each call to
//! stay under the API rate limit.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{ContentError, PipelineConfig, ProviderDefinition, ProviderDefinitionLoader, Result};
use crate::discovery::inference::{InferenceInput, InferencePipeline};
use crate::discovery::{require_definition, ContentDiscoverer};
use crate::model::{
    generate_publisher_content_id, manifest_version_number, ArchiveKind, ContentSearchQuery, ContentSearchResult,
    DiscoveryPage, GitHubAsset, GitHubRelease, GitHubRepository, GitHubSearchResponse, SearchPayload,
};
use crate::services::{fetch_json, HttpFetcher, RequestHeaders};

/// Topic every first-party repository carries; forks must carry it too
pub const PRIMARY_TOPIC: &str = "genhub";

/// Topics searched, in order
pub const DEFAULT_TOPICS: [&str; 4] = ["genhub", "generals-mod", "zero-hour-mod", "cnc-generals"];

const DEFAULT_API_URL: &str = "https://api.github.com";
const SEARCH_PAGE_SIZE: usize = 50;

/// Resolver metadata keys written for GitHub results
pub mod metadata_keys {
    pub const OWNER: &str = "owner";
    pub const REPOSITORY: &str = "repository";
    pub const TAG: &str = "tag";
    pub const ASSET_NAME: &str = "assetName";
    pub const VARIANT: &str = "variant";
}

static RESOLUTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d{3,4})\s*x\s*(\d{3,4})").expect("valid resolution regex"));

const LANGUAGES: [&str; 11] = [
    "english", "german", "french", "spanish", "italian", "polish", "russian", "chinese", "korean", "brazilian",
    "arabic",
];

pub struct GitHubTopicDiscoverer {
    name: String,
    provider_id: String,
    fetcher: Arc<dyn HttpFetcher>,
    definitions: Arc<dyn ProviderDefinitionLoader>,
    topics: Vec<String>,
    inference: InferencePipeline,
    request_gate: Arc<Semaphore>,
    request_delay: Duration,
    token: Option<String>,
}

impl GitHubTopicDiscoverer {
    pub fn new<S: Into<String>>(
        provider_id: S,
        fetcher: Arc<dyn HttpFetcher>,
        definitions: Arc<dyn ProviderDefinitionLoader>,
        config: &PipelineConfig,
    ) -> Self {
        dotenv::dotenv().ok(); // Ignore error if .env not present
        let token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.trim().is_empty());
        if token.is_none() {
            debug!("GITHUB_TOKEN not set, using unauthenticated GitHub requests");
        }

        Self {
            name: "github".to_string(),
            provider_id: provider_id.into(),
            fetcher,
            definitions,
            topics: DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect(),
            inference: InferencePipeline::default(),
            request_gate: Arc::new(Semaphore::new(1)),
            request_delay: config.github_request_delay,
            token,
        }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_inference(mut self, inference: InferencePipeline) -> Self {
        self.inference = inference;
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_token<S: Into<String>>(mut self, token: Option<S>) -> Self {
        self.token = token.map(Into::into);
        self
    }

    fn headers(&self) -> RequestHeaders {
        let mut headers = vec![
            ("Accept".to_string(), "application/vnd.github+json".to_string()),
            ("X-GitHub-Api-Version".to_string(), "2022-11-28".to_string()),
        ];
        if let Some(token) = &self.token {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
        headers
    }

    fn api_url(definition: &ProviderDefinition) -> String {
        definition
            .endpoints
            .api_url
            .as_deref()
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string()
    }

    /// Search every topic; fails only when no topic could be searched
    async fn search_repositories(
        &self,
        api: &str,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<(Vec<GitHubRepository>, bool)> {
        let headers = self.headers();
        let mut seen = HashSet::new();
        let mut repositories = Vec::new();
        let mut has_more = false;
        let mut failures = Vec::new();

        for topic in &self.topics {
            let url = format!(
                "{}/search/repositories?q=topic:{}&sort=updated&order=desc&per_page={}&page={}",
                api, topic, SEARCH_PAGE_SIZE, page
            );
            match fetch_json::<GitHubSearchResponse>(self.fetcher.as_ref(), &url, &headers, cancel).await {
                Ok(response) => {
                    has_more |= response.items.len() >= SEARCH_PAGE_SIZE;
                    for repository in response.items {
                        if seen.insert(repository.id) {
                            repositories.push(repository);
                        }
                    }
                }
                Err(ContentError::Cancelled { operation }) => return Err(ContentError::Cancelled { operation }),
                Err(e) => {
                    warn!("GitHub topic '{}' search failed: {}", topic, e);
                    failures.push(format!("topic {}: {}", topic, e));
                }
            }
        }

        if !failures.is_empty() && failures.len() == self.topics.len() {
            return Err(ContentError::SearchFailed { errors: failures });
        }
        Ok((repositories, has_more))
    }

    /// Latest release of one repository, serialized behind the request gate
    async fn latest_release(
        &self,
        api: &str,
        repository: &GitHubRepository,
        cancel: &CancellationToken,
    ) -> Result<GitHubRelease> {
        let _permit = self
            .request_gate
            .acquire()
            .await
            .map_err(|_| ContentError::cancelled("GitHub request gate closed"))?;

        let url = format!("{}/repos/{}/releases/latest", api, repository.full_name);
        let result = fetch_json::<GitHubRelease>(self.fetcher.as_ref(), &url, &self.headers(), cancel).await;

        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
        result
    }

    fn build_results(
        &self,
        definition: &ProviderDefinition,
        repository: &GitHubRepository,
        release: &GitHubRelease,
    ) -> Vec<ContentSearchResult> {
        let description = repository.description.clone().unwrap_or_default();
        let input = InferenceInput {
            name: &repository.name,
            description: &description,
            topics: &repository.topics,
        };
        let (content_type, target_game) = self.inference.infer(&input);

        let standalone: Vec<&GitHubAsset> = release.assets.iter().filter(|a| is_standalone_asset(&a.name)).collect();
        let variants: Vec<Option<&GitHubAsset>> = if standalone.len() > 1 {
            standalone.into_iter().map(Some).collect()
        } else {
            vec![None]
        };

        variants
            .into_iter()
            .map(|asset| {
                let variant = asset.map(|a| variant_name(&a.name));
                let display_name = match &variant {
                    Some(v) => format!("{} ({})", repository.name, v),
                    None => repository.name.clone(),
                };
                let id_name = match &variant {
                    Some(v) => format!("{}{}", repository.name, v),
                    None => repository.name.clone(),
                };

                let mut result = ContentSearchResult::new(
                    generate_publisher_content_id(
                        &repository.owner.login,
                        content_type,
                        &id_name,
                        manifest_version_number(&release.tag_name),
                    ),
                    display_name,
                    definition.provider_id.clone(),
                );
                result.description = if description.is_empty() {
                    release.body.as_deref().and_then(|b| b.lines().next()).unwrap_or_default().to_string()
                } else {
                    description.clone()
                };
                result.version = release.tag_name.clone();
                result.content_type = content_type;
                result.target_game = target_game;
                result.author_name = repository.owner.login.clone();
                result.source_url = Some(if release.html_url.is_empty() {
                    repository.html_url.clone()
                } else {
                    release.html_url.clone()
                });
                result.icon_url = repository.owner.avatar_url.clone();
                result.last_updated = release.published_at.or(repository.updated_at);
                match asset {
                    Some(a) => {
                        result.download_size = Some(a.size);
                        result.download_count = Some(a.download_count);
                    }
                    None => {
                        result.download_size = Some(release.assets.iter().map(|a| a.size).sum());
                        result.download_count = Some(release.assets.iter().map(|a| a.download_count).sum());
                    }
                }
                result.requires_resolution = true;
                result.resolver_id = Some(definition.resolver_id.clone());
                result.add_tags(&definition.default_tags);
                result.add_tags(repository.topics.iter().filter(|t| t.as_str() != PRIMARY_TOPIC));

                result.set_metadata(metadata_keys::OWNER, repository.owner.login.clone());
                result.set_metadata(metadata_keys::REPOSITORY, repository.name.clone());
                result.set_metadata(metadata_keys::TAG, release.tag_name.clone());
                if let Some(a) = asset {
                    result.set_metadata(metadata_keys::ASSET_NAME, a.name.clone());
                }
                if let Some(v) = &variant {
                    result.set_metadata(metadata_keys::VARIANT, v.clone());
                }

                result.data = SearchPayload::GitHubRelease {
                    repository: Box::new(repository.clone()),
                    release: Box::new(release.clone()),
                    asset: asset.cloned(),
                };
                result
            })
            .collect()
    }
}

/// Whether a repository belongs in the results at all
pub fn is_eligible_repository(repository: &GitHubRepository) -> bool {
    if repository.archived || repository.disabled {
        return false;
    }
    if repository.fork && !repository.topics.iter().any(|t| t.eq_ignore_ascii_case(PRIMARY_TOPIC)) {
        return false;
    }
    true
}

/// Asset that is installed as-is rather than extracted
pub fn is_standalone_asset(file_name: &str) -> bool {
    let lower = file_name.to_ascii_lowercase();
    ArchiveKind::from_file_name(&lower).is_none() && !lower.ends_with(".rar") && !lower.ends_with(".tar.gz")
}

/// Language or resolution found in an asset file name, else its stem
pub fn variant_name(file_name: &str) -> String {
    let lower = file_name.to_ascii_lowercase();
    if let Some(language) = LANGUAGES.iter().find(|l| lower.contains(*l)) {
        return language.to_string();
    }
    if let Some(caps) = RESOLUTION.captures(&lower) {
        return format!("{}x{}", &caps[1], &caps[2]);
    }
    std::path::Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string())
}

#[async_trait]
impl ContentDiscoverer for GitHubTopicDiscoverer {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "GitHub repositories tagged with community topics"
    }

    async fn discover(&self, query: &ContentSearchQuery, cancel: &CancellationToken) -> Result<DiscoveryPage> {
        let definition = require_definition(self.definitions.as_ref(), &self.provider_id)?;
        let api = Self::api_url(&definition);

        let (repositories, has_more) = self.search_repositories(&api, query.page, cancel).await?;
        debug!("GitHub search returned {} unique repositories", repositories.len());

        let mut items = Vec::new();
        for repository in repositories.iter().filter(|r| is_eligible_repository(r)) {
            if cancel.is_cancelled() {
                return Err(ContentError::cancelled("GitHub release lookup"));
            }
            match self.latest_release(&api, repository, cancel).await {
                Ok(release) if release.draft => debug!("Skipping draft release of {}", repository.full_name),
                Ok(release) => items.extend(self.build_results(&definition, repository, &release)),
                Err(ContentError::Cancelled { operation }) => return Err(ContentError::Cancelled { operation }),
                Err(e) => debug!("No usable release for {}: {}", repository.full_name, e),
            }
        }

        items.retain(|item| query.matches(item));
        info!("GitHub: {} result(s) from {} repositories", items.len(), repositories.len());
        Ok(DiscoveryPage::new(items, has_more))
    }
}
