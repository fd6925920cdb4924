//! Discoverer over the Community Outpost catalog and patch index page

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::catalog::{metadata_keys, CatalogParser};
use crate::core::{ContentError, ProviderDefinition, ProviderDefinitionLoader, Result};
use crate::discovery::{require_definition, ContentDiscoverer};
use crate::model::{
    generate_publisher_content_id, manifest_version_number, ContentSearchQuery, ContentSearchResult, ContentType,
    DiscoveryPage, GameType,
};
use crate::services::HttpFetcher;

static PATCH_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"href\s*=\s*"(?P<url>[^"]*?(?P<version>\d{4}-\d{2}-\d{2})[^"]*\.zip)""#)
        .expect("valid patch link regex")
});

/// Name of the singleton community patch entry
pub const COMMUNITY_PATCH_NAME: &str = "Community Patch";

pub struct CommunityOutpostDiscoverer {
    name: String,
    provider_id: String,
    fetcher: Arc<dyn HttpFetcher>,
    definitions: Arc<dyn ProviderDefinitionLoader>,
    parser: CatalogParser,
}

impl CommunityOutpostDiscoverer {
    pub fn new<S: Into<String>>(
        provider_id: S,
        fetcher: Arc<dyn HttpFetcher>,
        definitions: Arc<dyn ProviderDefinitionLoader>,
    ) -> Self {
        Self {
            name: "communityoutpost".to_string(),
            provider_id: provider_id.into(),
            fetcher,
            definitions,
            parser: CatalogParser::new(),
        }
    }

    /// Register under a different discoverer id
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Try each catalog URL in order; the first that answers wins
    async fn fetch_catalog(&self, definition: &ProviderDefinition, cancel: &CancellationToken) -> Result<String> {
        let mut last_error = None;
        for url in &definition.endpoints.catalog_urls {
            match self.fetcher.fetch_text(url, &[], cancel).await {
                Ok(text) => {
                    debug!("Fetched catalog from {}", url);
                    return Ok(text);
                }
                Err(ContentError::Cancelled { operation }) => return Err(ContentError::Cancelled { operation }),
                Err(e) => {
                    warn!("Catalog mirror {} failed: {}", url, e);
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) => e,
            None => ContentError::Configuration {
                message: format!("provider '{}' has no catalog URLs", definition.provider_id),
                field: Some("endpoints.catalogUrls".to_string()),
                suggestion: None,
            },
        })
    }

    async fn discover_community_patch(
        &self,
        definition: &ProviderDefinition,
        cancel: &CancellationToken,
    ) -> Result<Option<ContentSearchResult>> {
        let Some(index_url) = definition.endpoints.index_page_url.as_deref() else {
            return Ok(None);
        };

        let page = self.fetcher.fetch_text(index_url, &[], cancel).await?;
        Ok(community_patch_from_index(&page, index_url, definition))
    }
}

/// Newest dated patch archive linked from the index page
pub fn community_patch_from_index(
    page: &str,
    index_url: &str,
    definition: &ProviderDefinition,
) -> Option<ContentSearchResult> {
    let (href, version) = PATCH_LINK
        .captures_iter(page)
        .filter_map(|caps| Some((caps.name("url")?.as_str().to_string(), caps.name("version")?.as_str().to_string())))
        .max_by(|a, b| a.1.cmp(&b.1))?;

    let url = Url::parse(index_url)
        .and_then(|base| base.join(&href))
        .map(|u| u.to_string())
        .ok()?;

    let mut result = ContentSearchResult::new(
        generate_publisher_content_id(
            &definition.provider_id,
            ContentType::Patch,
            COMMUNITY_PATCH_NAME,
            manifest_version_number(&version),
        ),
        COMMUNITY_PATCH_NAME,
        definition.provider_id.clone(),
    );
    result.description = "Community maintained balance and bug fix patch for Zero Hour".to_string();
    result.version = version.clone();
    result.content_type = ContentType::Patch;
    result.target_game = GameType::ZeroHour;
    result.author_name = definition.display_name.clone();
    result.source_url = Some(url.clone());
    result.last_updated = NaiveDate::parse_from_str(&version, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt));
    result.requires_resolution = true;
    result.resolver_id = Some(definition.resolver_id.clone());
    result.add_tags(&definition.default_tags);
    result.add_tags(["patch", "community"]);
    result.set_metadata(metadata_keys::DOWNLOAD_URL, url);
    result.set_metadata(metadata_keys::CATALOG_VERSION, version);
    Some(result)
}

#[async_trait]
impl ContentDiscoverer for CommunityOutpostDiscoverer {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Community Outpost catalog with the community patch"
    }

    async fn discover(&self, query: &ContentSearchQuery, cancel: &CancellationToken) -> Result<DiscoveryPage> {
        let definition = require_definition(self.definitions.as_ref(), &self.provider_id)?;

        let catalog = self.fetch_catalog(&definition, cancel).await?;
        let catalog_items = self.parser.parse(&catalog, &definition)?;

        let mut items = Vec::with_capacity(catalog_items.len() + 1);
        match self.discover_community_patch(&definition, cancel).await {
            Ok(Some(patch)) => items.push(patch),
            Ok(None) => debug!("No community patch found for '{}'", definition.provider_id),
            Err(ContentError::Cancelled { operation }) => return Err(ContentError::Cancelled { operation }),
            Err(e) => warn!("Community patch lookup failed for '{}': {}", definition.provider_id, e),
        }
        items.extend(catalog_items);

        let total = items.len();
        items.retain(|item| query.matches(item));
        info!("Community Outpost: {} of {} item(s) match the query", items.len(), total);

        Ok(DiscoveryPage::new(items, false))
    }
}
