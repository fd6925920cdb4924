//! Search queries and lightweight discovery records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::{ContentError, Result};
use crate::model::payload::SearchPayload;
use crate::model::types::{ContentSortOrder, ContentType, GameType};

/// Largest page size accepted by the orchestrator
pub const MAX_TAKE: usize = 1000;

/// Parameters of a content search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSearchQuery {
    pub search_term: Option<String>,
    pub content_type: Option<ContentType>,
    pub target_game: Option<GameType>,
    /// Remote page requested from paginated sources (1-based)
    pub page: u32,
    /// Items skipped from the aggregated result set
    pub skip: usize,
    /// Items returned from the aggregated result set
    pub take: usize,
    pub sort_order: ContentSortOrder,
}

impl Default for ContentSearchQuery {
    fn default() -> Self {
        Self {
            search_term: None,
            content_type: None,
            target_game: None,
            page: 1,
            skip: 0,
            take: 50,
            sort_order: ContentSortOrder::Relevance,
        }
    }
}

impl ContentSearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_term<S: Into<String>>(mut self, term: S) -> Self {
        self.search_term = Some(term.into());
        self
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn with_target_game(mut self, game: GameType) -> Self {
        self.target_game = Some(game);
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn with_skip_take(mut self, skip: usize, take: usize) -> Self {
        self.skip = skip;
        self.take = take;
        self
    }

    pub fn with_sort_order(mut self, order: ContentSortOrder) -> Self {
        self.sort_order = order;
        self
    }

    /// Reject page sizes outside of 1..=MAX_TAKE
    pub fn validate(&self) -> Result<()> {
        if self.take == 0 || self.take > MAX_TAKE {
            return Err(ContentError::InvalidQuery {
                message: format!("take must be between 1 and {}, got {}", MAX_TAKE, self.take),
            });
        }
        Ok(())
    }

    /// Trimmed, lowercased search term; `None` for blank terms
    pub fn normalized_term(&self) -> Option<String> {
        self.search_term
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
    }

    /// Composite cache key over every parameter that changes the answer
    pub fn cache_key(&self) -> String {
        format!(
            "search:{}:{:?}:{:?}:{}:{}:{}:{:?}",
            self.normalized_term().unwrap_or_default(),
            self.content_type,
            self.target_game,
            self.page,
            self.skip,
            self.take,
            self.sort_order,
        )
    }

    /// Post-fetch filter over term, content type and target game
    pub fn matches(&self, result: &ContentSearchResult) -> bool {
        if let Some(content_type) = self.content_type {
            if result.content_type != content_type {
                return false;
            }
        }

        if let Some(game) = self.target_game {
            if game != GameType::Unknown && result.target_game != GameType::Unknown && result.target_game != game {
                return false;
            }
        }

        match self.normalized_term() {
            None => true,
            Some(term) => {
                result.name.to_lowercase().contains(&term)
                    || result.description.to_lowercase().contains(&term)
                    || result.tags.iter().any(|tag| tag.to_lowercase().contains(&term))
            }
        }
    }
}

/// Provider-agnostic discovery record; immutable once emitted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSearchResult {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub content_type: ContentType,
    pub target_game: GameType,
    pub provider_name: String,
    pub author_name: String,
    pub source_url: Option<String>,
    pub icon_url: Option<String>,
    /// Ordered, duplicate-free
    pub tags: Vec<String>,
    pub download_size: Option<u64>,
    pub download_count: Option<u64>,
    pub rating: Option<f32>,
    pub last_updated: Option<DateTime<Utc>>,
    pub requires_resolution: bool,
    pub resolver_id: Option<String>,
    pub resolver_metadata: HashMap<String, String>,
    #[serde(skip)]
    pub data: SearchPayload,
}

impl ContentSearchResult {
    pub fn new<I: Into<String>, N: Into<String>, P: Into<String>>(id: I, name: N, provider_name: P) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            provider_name: provider_name.into(),
            ..Default::default()
        }
    }

    /// Append a tag unless an equal one (ignoring case) is present
    pub fn add_tag<S: AsRef<str>>(&mut self, tag: S) {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            return;
        }
        if !self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            self.tags.push(tag.to_string());
        }
    }

    pub fn add_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            self.add_tag(tag);
        }
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.resolver_metadata.get(key).map(String::as_str)
    }

    pub fn set_metadata<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.resolver_metadata.insert(key.into(), value.into());
    }
}

/// One page of results from a single discoverer
#[derive(Debug, Clone, Default)]
pub struct DiscoveryPage {
    pub items: Vec<ContentSearchResult>,
    pub has_more_items: bool,
}

impl DiscoveryPage {
    pub fn new(items: Vec<ContentSearchResult>, has_more_items: bool) -> Self {
        Self { items, has_more_items }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Failure of one provider during a fan-out search
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSearchError {
    pub provider_name: String,
    pub message: String,
}

impl std::fmt::Display for ProviderSearchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider_name, self.message)
    }
}

/// Aggregated answer of an orchestrated search
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub items: Vec<ContentSearchResult>,
    /// Providers that failed while others succeeded
    pub errors: Vec<ProviderSearchError>,
    /// Result count before skip/take
    pub total_count: usize,
    pub has_more_items: bool,
}
