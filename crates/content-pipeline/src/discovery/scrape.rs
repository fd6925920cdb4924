//! Discoverer over HTML listing pages
//!
//! Layouts are CSS selectors; the regex helpers recover size, download
//! count and dates from free text when a site gives no dedicated element.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::core::{ContentError, ProviderDefinition, ProviderDefinitionLoader, Result};
use crate::discovery::{require_definition, ContentDiscoverer};
use crate::model::{
    generate_publisher_content_id, manifest_version_number, ContentSearchQuery, ContentSearchResult, ContentType,
    DiscoveryPage, GameType,
};
use crate::services::HttpFetcher;

/// Resolver metadata key holding the absolute detail page URL
pub const DETAIL_URL_KEY: &str = "detailUrl";

static SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(KB|MB|GB|B)\b").expect("valid size regex"));
static DOWNLOADS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([\d,]+)\s+downloads?").expect("valid downloads regex"));
static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("valid date regex"));

/// CSS selectors describing one site's listing page
#[derive(Debug, Clone)]
pub struct ScrapeLayout {
    /// One element per listed item
    pub row: String,
    pub title: String,
    /// Link to the detail page; the title's own href when unset
    pub link: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub size: Option<String>,
    pub downloads: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub content_type: ContentType,
    pub target_game: GameType,
}

impl ScrapeLayout {
    pub fn new<R: Into<String>, T: Into<String>>(row: R, title: T) -> Self {
        Self {
            row: row.into(),
            title: title.into(),
            link: None,
            author: None,
            date: None,
            size: None,
            downloads: None,
            description: None,
            icon: None,
            content_type: ContentType::Mod,
            target_game: GameType::ZeroHour,
        }
    }

    /// Listing rows of a ModDB addons/mods page
    pub fn moddb() -> Self {
        Self {
            author: Some("span.subheading a".to_string()),
            date: Some("time".to_string()),
            size: Some("span.subheading".to_string()),
            description: Some("p".to_string()),
            icon: Some("a.image img".to_string()),
            ..Self::new("div.row.rowcontent", "h4 a")
        }
    }

    /// Download table of a CNC Labs section page
    pub fn cnclabs() -> Self {
        Self {
            author: Some("td.author".to_string()),
            date: Some("td.date".to_string()),
            size: Some("td.size".to_string()),
            downloads: Some("td.downloads".to_string()),
            description: Some("td.description".to_string()),
            content_type: ContentType::Map,
            ..Self::new("table.downloads tr", "td.title a")
        }
    }

    pub fn with_content_type(mut self, content_type: ContentType, target_game: GameType) -> Self {
        self.content_type = content_type;
        self.target_game = target_game;
        self
    }

    fn compile(&self) -> Result<CompiledLayout> {
        Ok(CompiledLayout {
            row: parse_selector(&self.row)?,
            title: parse_selector(&self.title)?,
            link: self.link.as_deref().map(parse_selector).transpose()?,
            author: self.author.as_deref().map(parse_selector).transpose()?,
            date: self.date.as_deref().map(parse_selector).transpose()?,
            size: self.size.as_deref().map(parse_selector).transpose()?,
            downloads: self.downloads.as_deref().map(parse_selector).transpose()?,
            description: self.description.as_deref().map(parse_selector).transpose()?,
            icon: self.icon.as_deref().map(parse_selector).transpose()?,
        })
    }
}

struct CompiledLayout {
    row: Selector,
    title: Selector,
    link: Option<Selector>,
    author: Option<Selector>,
    date: Option<Selector>,
    size: Option<Selector>,
    downloads: Option<Selector>,
    description: Option<Selector>,
    icon: Option<Selector>,
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| ContentError::Configuration {
        message: format!("invalid CSS selector '{}': {}", selector, e),
        field: Some("layout".to_string()),
        suggestion: None,
    })
}

pub struct ScrapeDiscoverer {
    name: String,
    provider_id: String,
    fetcher: Arc<dyn HttpFetcher>,
    definitions: Arc<dyn ProviderDefinitionLoader>,
    layout: ScrapeLayout,
}

impl ScrapeDiscoverer {
    pub fn new<N: Into<String>, P: Into<String>>(
        name: N,
        provider_id: P,
        fetcher: Arc<dyn HttpFetcher>,
        definitions: Arc<dyn ProviderDefinitionLoader>,
        layout: ScrapeLayout,
    ) -> Self {
        Self {
            name: name.into(),
            provider_id: provider_id.into(),
            fetcher,
            definitions,
            layout,
        }
    }

    fn listing_url(definition: &ProviderDefinition, query: &ContentSearchQuery) -> Result<String> {
        let template = definition.endpoints.search_url_template.as_deref().ok_or_else(|| {
            ContentError::Configuration {
                message: format!("provider '{}' has no search URL template", definition.provider_id),
                field: Some("endpoints.searchUrlTemplate".to_string()),
                suggestion: Some("Use {page} and {term} placeholders".to_string()),
            }
        })?;

        let term: String = url::form_urlencoded::byte_serialize(
            query.normalized_term().unwrap_or_default().as_bytes(),
        )
        .collect();
        let filled = template.replace("{page}", &query.page.to_string()).replace("{term}", &term);
        definition.resolve_url(&filled)
    }
}

/// Parse one listing page; rows without a title or link are skipped
pub fn parse_listing(
    html: &str,
    page_url: &str,
    layout: &ScrapeLayout,
    definition: &ProviderDefinition,
    current_page: u32,
) -> Result<(Vec<ContentSearchResult>, bool)> {
    let compiled = layout.compile()?;
    let base = Url::parse(page_url)?;
    let document = Html::parse_document(html);

    let mut items = Vec::new();
    for row in document.select(&compiled.row) {
        match parse_row(row, &compiled, layout, &base, definition) {
            Some(item) => items.push(item),
            None => debug!("Skipping listing row without title or link on {}", page_url),
        }
    }

    let has_more = has_next_page(&document, current_page);
    Ok((items, has_more))
}

fn parse_row(
    row: ElementRef<'_>,
    compiled: &CompiledLayout,
    layout: &ScrapeLayout,
    base: &Url,
    definition: &ProviderDefinition,
) -> Option<ContentSearchResult> {
    let title_element = row.select(&compiled.title).next()?;
    let title = element_text(title_element);
    if title.is_empty() {
        return None;
    }

    let href = match &compiled.link {
        Some(selector) => row.select(selector).next()?.value().attr("href")?,
        None => title_element.value().attr("href")?,
    };
    let detail_url = base.join(href).ok()?.to_string();

    let select_text = |selector: &Option<Selector>| {
        selector
            .as_ref()
            .and_then(|s| row.select(s).next())
            .map(element_text)
            .filter(|t| !t.is_empty())
    };

    let row_text = element_text(row);
    let released = compiled
        .date
        .as_ref()
        .and_then(|s| row.select(s).next())
        .and_then(|el| el.value().attr("datetime").map(str::to_string).or_else(|| Some(element_text(el))))
        .and_then(|text| parse_listing_date(&text));
    let version = released.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();

    let mut result = ContentSearchResult::new(
        generate_publisher_content_id(
            &definition.provider_id,
            layout.content_type,
            &title,
            manifest_version_number(&version),
        ),
        title,
        definition.provider_id.clone(),
    );
    result.version = version;
    result.content_type = layout.content_type;
    result.target_game = layout.target_game;
    result.description = select_text(&compiled.description).unwrap_or_default();
    result.author_name = select_text(&compiled.author).unwrap_or_default();
    result.download_size = select_text(&compiled.size)
        .and_then(|t| parse_size(&t))
        .or_else(|| parse_size(&row_text));
    result.download_count = select_text(&compiled.downloads)
        .and_then(|t| parse_download_count(&t).or_else(|| t.replace(',', "").parse().ok()))
        .or_else(|| parse_download_count(&row_text));
    result.icon_url = compiled
        .icon
        .as_ref()
        .and_then(|s| row.select(s).next())
        .and_then(|img| img.value().attr("src"))
        .and_then(|src| base.join(src).ok())
        .map(|u| u.to_string());
    result.last_updated = released;
    result.source_url = Some(detail_url.clone());
    result.requires_resolution = true;
    result.resolver_id = Some(definition.resolver_id.clone());
    result.add_tags(&definition.default_tags);
    result.add_tag(layout.content_type.slug());
    result.set_metadata(DETAIL_URL_KEY, detail_url);
    Some(result)
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// "12.5 MB" style sizes in bytes
pub fn parse_size(text: &str) -> Option<u64> {
    let caps = SIZE.captures(text)?;
    let value: f64 = caps[1].parse().ok()?;
    let multiplier = match caps[2].to_ascii_uppercase().as_str() {
        "KB" => 1024.0,
        "MB" => 1024.0 * 1024.0,
        "GB" => 1024.0 * 1024.0 * 1024.0,
        _ => 1.0,
    };
    Some((value * multiplier).round() as u64)
}

/// "1,234 downloads" style counters
pub fn parse_download_count(text: &str) -> Option<u64> {
    let caps = DOWNLOADS.captures(text)?;
    caps[1].replace(',', "").parse().ok()
}

/// Dates as listing pages print them
pub fn parse_listing_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    let date = ISO_DATE
        .find(text)
        .and_then(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
        .or_else(|| {
            ["%b %d, %Y", "%B %d, %Y", "%d %b %Y", "%d %B %Y", "%d/%m/%Y"]
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        })?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

/// A "next" link or a numbered link past the current page
fn has_next_page(document: &Html, current_page: u32) -> bool {
    let Ok(anchors) = Selector::parse("a") else {
        return false;
    };

    document.select(&anchors).any(|anchor| {
        if anchor.value().attr("rel").is_some_and(|rel| rel.eq_ignore_ascii_case("next")) {
            return true;
        }
        let text = element_text(anchor).to_lowercase();
        if text.contains("next") || text == "»" || text == "›" || text == "…" {
            return true;
        }
        text.parse::<u32>().is_ok_and(|n| n > current_page)
    })
}

#[async_trait]
impl ContentDiscoverer for ScrapeDiscoverer {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "HTML listing pages"
    }

    async fn discover(&self, query: &ContentSearchQuery, cancel: &CancellationToken) -> Result<DiscoveryPage> {
        let definition = require_definition(self.definitions.as_ref(), &self.provider_id)?;
        let url = Self::listing_url(&definition, query)?;

        let html = self.fetcher.fetch_text(&url, &[], cancel).await?;
        let (mut items, has_more) = parse_listing(&html, &url, &self.layout, &definition, query.page)?;

        let total = items.len();
        items.retain(|item| query.matches(item));
        info!("{}: {} of {} listed item(s) match the query", self.name, items.len(), total);

        Ok(DiscoveryPage::new(items, has_more))
    }
}
