//! Resolver that reads the download link off a scraped detail page

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::core::{ContentError, ProviderDefinitionLoader, Result};
use crate::discovery::require_definition;
use crate::discovery::scrape::{parse_selector, parse_size, DETAIL_URL_KEY};
use crate::model::{
    normalize_id_segment, ContentManifest, ContentManifestBuilder, ContentMetadata, ContentSearchResult, ManifestFile,
};
use crate::resolution::dependencies::dependencies_for;
use crate::resolution::{file_name_from_url, ContentResolver};
use crate::services::HttpFetcher;

const DEFAULT_DOWNLOAD_SELECTOR: &str = "a#downloadmirrorstoggle, a.download, a[href*='/downloads/start/'], a[href$='.zip'], a[href$='.7z']";

/// What a detail page says about the download
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetailPage {
    pub download_url: Option<String>,
    pub size: Option<u64>,
    pub description: Option<String>,
}

pub struct ScrapeResolver {
    id: String,
    provider_id: String,
    fetcher: Arc<dyn HttpFetcher>,
    definitions: Arc<dyn ProviderDefinitionLoader>,
    download_selector: String,
}

impl ScrapeResolver {
    pub fn new<I: Into<String>, P: Into<String>>(
        id: I,
        provider_id: P,
        fetcher: Arc<dyn HttpFetcher>,
        definitions: Arc<dyn ProviderDefinitionLoader>,
    ) -> Self {
        Self {
            id: id.into(),
            provider_id: provider_id.into(),
            fetcher,
            definitions,
            download_selector: DEFAULT_DOWNLOAD_SELECTOR.to_string(),
        }
    }

    pub fn with_download_selector<S: Into<String>>(mut self, selector: S) -> Self {
        self.download_selector = selector.into();
        self
    }
}

/// Pull the download link, size and summary out of a detail page
pub fn parse_detail_page(html: &str, page_url: &str, download_selector: &str) -> Result<DetailPage> {
    let selector = parse_selector(download_selector)?;
    let base = Url::parse(page_url)?;
    let document = Html::parse_document(html);

    let download_url = document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| base.join(href).ok())
        .map(|u| u.to_string());

    let description = Selector::parse("meta[name='description']")
        .ok()
        .and_then(|s| document.select(&s).next().and_then(|m| m.value().attr("content")).map(str::to_string))
        .filter(|d| !d.trim().is_empty());

    let text: String = document.root_element().text().collect::<Vec<_>>().join(" ");
    Ok(DetailPage {
        download_url,
        size: parse_size(&text),
        description,
    })
}

#[async_trait]
impl ContentResolver for ScrapeResolver {
    fn resolver_id(&self) -> &str {
        &self.id
    }

    async fn resolve(&self, item: &ContentSearchResult, cancel: &CancellationToken) -> Result<ContentManifest> {
        let definition = require_definition(self.definitions.as_ref(), &self.provider_id)?;
        let detail_url = item
            .metadata(DETAIL_URL_KEY)
            .map(str::to_string)
            .or_else(|| item.source_url.clone())
            .ok_or_else(|| ContentError::Resolution {
                content_id: item.id.clone(),
                reason: "no detail page URL".to_string(),
            })?;

        let html = self.fetcher.fetch_text(&detail_url, &[], cancel).await?;
        let page = parse_detail_page(&html, &detail_url, &self.download_selector)?;
        let download_url = page.download_url.ok_or_else(|| ContentError::Resolution {
            content_id: item.id.clone(),
            reason: format!("no download link on {}", detail_url),
        })?;
        debug!("Download link for '{}': {}", item.name, download_url);

        let file_name = file_name_from_url(&download_url)
            .filter(|name| name.contains('.'))
            .unwrap_or_else(|| format!("{}.zip", normalize_id_segment(&item.name)));
        let mut file = ManifestFile::remote(file_name, download_url, item.download_size.or(page.size).unwrap_or(0));
        file.install_target = item.content_type.default_install_target();

        let metadata = ContentMetadata {
            description: if item.description.is_empty() {
                page.description.unwrap_or_default()
            } else {
                item.description.clone()
            },
            tags: item.tags.clone(),
            icon_url: item.icon_url.clone(),
            release_date: item.last_updated,
            ..Default::default()
        };

        ContentManifestBuilder::new()
            .with_basic_info(item.name.clone(), item.version.clone())
            .with_content_type(item.content_type, item.target_game)
            .with_publisher(definition.publisher_info())
            .with_metadata(metadata)
            .with_dependencies(dependencies_for(item.content_type, item.target_game))
            .add_file(file)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{JsonProviderDefinitionLoader, PipelineConfig, ProviderDefinition};
    use crate::model::{ContentType, GameType};
    use crate::services::ReqwestFetcher;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DETAIL: &str = r#"<html><head><meta name="description" content="A desert map"></head>
        <body><p>Size: 2 MB</p><a class="download" href="/files/desert.zip">Download</a></body></html>"#;

    #[test]
    fn test_parse_detail_page() {
        let page = parse_detail_page(DETAIL, "https://labs.example/maps/desert", DEFAULT_DOWNLOAD_SELECTOR).unwrap();
        assert_eq!(page.download_url.as_deref(), Some("https://labs.example/files/desert.zip"));
        assert_eq!(page.size, Some(2 * 1024 * 1024));
        assert_eq!(page.description.as_deref(), Some("A desert map"));
    }

    #[tokio::test]
    async fn test_resolve_builds_single_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/maps/desert"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DETAIL))
            .mount(&server)
            .await;

        let definition = ProviderDefinition::new("cnclabs", "cnclabs", "cnclabs", "http");
        let resolver = ScrapeResolver::new(
            "cnclabs",
            "cnclabs",
            Arc::new(ReqwestFetcher::new(&PipelineConfig::default()).unwrap()),
            Arc::new(JsonProviderDefinitionLoader::from_definitions([definition])),
        );

        let mut item = ContentSearchResult::new("id", "Desert", "cnclabs");
        item.version = "2024-03-01".to_string();
        item.content_type = ContentType::Map;
        item.target_game = GameType::ZeroHour;
        item.set_metadata(DETAIL_URL_KEY, format!("{}/maps/desert", server.uri()));

        let manifest = resolver.resolve(&item, &CancellationToken::new()).await.unwrap();
        assert_eq!(manifest.files.len(), 1);
        assert_eq!(manifest.files[0].relative_path, "desert.zip");
        assert_eq!(manifest.metadata.description, "A desert map");
        assert_eq!(manifest.manifest_version, 20240301);
    }

    #[tokio::test]
    async fn test_page_without_link_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>gone</body></html>"))
            .mount(&server)
            .await;

        let definition = ProviderDefinition::new("cnclabs", "cnclabs", "cnclabs", "http");
        let resolver = ScrapeResolver::new(
            "cnclabs",
            "cnclabs",
            Arc::new(ReqwestFetcher::new(&PipelineConfig::default()).unwrap()),
            Arc::new(JsonProviderDefinitionLoader::from_definitions([definition])),
        );
        let mut item = ContentSearchResult::new("id", "Desert", "cnclabs");
        item.source_url = Some(format!("{}/maps/desert", server.uri()));

        let result = resolver.resolve(&item, &CancellationToken::new()).await;
        assert!(matches!(result, Err(ContentError::Resolution { .. })));
    }
}
