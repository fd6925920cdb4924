//! Typed payloads attached by discoverers for resolvers to consume

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogItem;
use crate::model::manifest::ContentManifest;

/// Data a discoverer already fetched, so the resolver does not fetch it again
#[derive(Debug, Clone, Default)]
pub enum SearchPayload {
    #[default]
    None,
    /// The content is fully known already (local manifests)
    Manifest(Box<ContentManifest>),
    /// A release from a git hosting API, optionally narrowed to one asset
    GitHubRelease {
        repository: Box<GitHubRepository>,
        release: Box<GitHubRelease>,
        asset: Option<GitHubAsset>,
    },
    /// A catalog entry with all of its mirrors
    CatalogItem(CatalogItem),
}

impl SearchPayload {
    pub fn manifest(&self) -> Option<&ContentManifest> {
        match self {
            SearchPayload::Manifest(manifest) => Some(manifest),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, SearchPayload::None)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GitHubOwner {
    pub login: String,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Repository as returned by the search API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GitHubRepository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub owner: GitHubOwner,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GitHubRelease {
    pub id: u64,
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GitHubAsset {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub size: u64,
    pub browser_download_url: String,
    #[serde(default)]
    pub download_count: u64,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Wrapper of the repository search endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubSearchResponse {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub items: Vec<GitHubRepository>,
}
