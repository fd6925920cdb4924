//! Provider definitions: per-source endpoints and policies loaded at startup

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use walkdir::WalkDir;

use crate::core::{ContentError, FileOperation, Result};
use crate::model::{GameType, PublisherInfo, PublisherType};

/// File suffix picked up by [`JsonProviderDefinitionLoader::load_from_directory`]
pub const PROVIDER_FILE_SUFFIX: &str = ".provider.json";

/// Static description of one content source, read-only once loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDefinition {
    pub provider_id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub publisher_type: PublisherType,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub discoverer_id: String,
    pub resolver_id: String,
    pub deliverer_id: String,
    #[serde(default)]
    pub endpoints: ProviderEndpoints,
    #[serde(default)]
    pub timeouts: ProviderTimeouts,
    /// Mirror names preferred in order, matched as case-insensitive substrings
    #[serde(default)]
    pub mirror_preference: Vec<String>,
    /// Fallback ordering of mirror names or hosts when no preference matches
    #[serde(default)]
    pub endpoint_priority: Vec<String>,
    #[serde(default)]
    pub catalog_format: Option<String>,
    #[serde(default)]
    pub default_tags: Vec<String>,
    #[serde(default)]
    pub target_game: GameType,
    #[serde(default)]
    pub catalog_policy: CatalogPolicy,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderEndpoints {
    /// Base for relative URLs found in catalogs and pages
    pub base_url: Option<String>,
    /// Catalog documents in fallback order
    pub catalog_urls: Vec<String>,
    pub index_page_url: Option<String>,
    pub api_url: Option<String>,
    /// Listing URL with `{page}` and `{term}` placeholders
    pub search_url_template: Option<String>,
    pub website_url: Option<String>,
    pub support_url: Option<String>,
    pub custom: HashMap<String, String>,
}

impl ProviderEndpoints {
    pub fn custom(&self, name: &str) -> Option<&str> {
        self.custom.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderTimeouts {
    pub catalog_timeout_secs: u64,
    pub content_timeout_secs: u64,
}

impl Default for ProviderTimeouts {
    fn default() -> Self {
        Self {
            catalog_timeout_secs: 30,
            content_timeout_secs: 300,
        }
    }
}

impl ProviderTimeouts {
    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog_timeout_secs)
    }

    pub fn content_timeout(&self) -> Duration {
        Duration::from_secs(self.content_timeout_secs)
    }
}

/// Which catalog entries a provider hides from search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogPolicy {
    /// Content codes starting with any of these prefixes are dropped
    pub excluded_code_prefixes: Vec<String>,
}

impl Default for CatalogPolicy {
    fn default() -> Self {
        // Official patches are installed through the game client flow
        Self {
            excluded_code_prefixes: vec!["104".to_string(), "108".to_string()],
        }
    }
}

impl CatalogPolicy {
    pub fn allow_all() -> Self {
        Self {
            excluded_code_prefixes: Vec::new(),
        }
    }

    pub fn is_excluded(&self, content_code: &str) -> bool {
        let code = content_code.to_ascii_lowercase();
        self.excluded_code_prefixes
            .iter()
            .any(|prefix| code.starts_with(&prefix.to_ascii_lowercase()))
    }
}

impl ProviderDefinition {
    /// Minimal definition wiring one component triple
    pub fn new<S: Into<String>>(provider_id: S, discoverer_id: &str, resolver_id: &str, deliverer_id: &str) -> Self {
        let provider_id = provider_id.into();
        Self {
            display_name: provider_id.clone(),
            provider_id,
            description: String::new(),
            publisher_type: PublisherType::Other,
            enabled: true,
            discoverer_id: discoverer_id.to_string(),
            resolver_id: resolver_id.to_string(),
            deliverer_id: deliverer_id.to_string(),
            endpoints: ProviderEndpoints::default(),
            timeouts: ProviderTimeouts::default(),
            mirror_preference: Vec::new(),
            endpoint_priority: Vec::new(),
            catalog_format: None,
            default_tags: Vec::new(),
            target_game: GameType::Unknown,
            catalog_policy: CatalogPolicy::default(),
        }
    }

    /// Publisher block stamped on manifests built for this provider
    pub fn publisher_info(&self) -> PublisherInfo {
        PublisherInfo {
            id: self.provider_id.clone(),
            name: self.display_name.clone(),
            website: self.endpoints.website_url.clone().or_else(|| self.endpoints.base_url.clone()),
            support_url: self.endpoints.support_url.clone(),
            publisher_type: self.publisher_type,
        }
    }

    /// Make `reference` absolute against the configured base URL
    pub fn resolve_url(&self, reference: &str) -> Result<String> {
        if let Ok(absolute) = Url::parse(reference) {
            return Ok(absolute.to_string());
        }

        let base = self.endpoints.base_url.as_deref().ok_or_else(|| ContentError::Configuration {
            message: format!("provider '{}' has no base URL to resolve '{}'", self.provider_id, reference),
            field: Some("endpoints.baseUrl".to_string()),
            suggestion: Some("Set endpoints.baseUrl in the provider definition".to_string()),
        })?;

        let base = Url::parse(base).map_err(|source| ContentError::InvalidUrl {
            url: base.to_string(),
            source,
        })?;
        base.join(reference)
            .map(|url| url.to_string())
            .map_err(|source| ContentError::InvalidUrl {
                url: reference.to_string(),
                source,
            })
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("providerId", &self.provider_id),
            ("discovererId", &self.discoverer_id),
            ("resolverId", &self.resolver_id),
            ("delivererId", &self.deliverer_id),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ContentError::Configuration {
                    message: format!("provider definition '{}' has an empty {}", self.provider_id, field),
                    field: Some(field.to_string()),
                    suggestion: None,
                });
            }
        }
        Ok(())
    }
}

/// Source of provider definitions
///
/// Unknown ids yield `None`; callers fail the operation at hand rather than
/// the whole pipeline.
pub trait ProviderDefinitionLoader: Send + Sync {
    fn get_provider(&self, provider_id: &str) -> Option<ProviderDefinition>;

    fn get_all_providers(&self) -> Vec<ProviderDefinition>;
}

/// Loader backed by `*.provider.json` files or definitions added in memory
#[derive(Debug, Default)]
pub struct JsonProviderDefinitionLoader {
    definitions: RwLock<HashMap<String, ProviderDefinition>>,
}

impl JsonProviderDefinitionLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions<I: IntoIterator<Item = ProviderDefinition>>(definitions: I) -> Self {
        let loader = Self::new();
        for definition in definitions {
            loader.add(definition);
        }
        loader
    }

    /// Read every provider file below `dir`; malformed files are skipped with a warning
    pub fn load_from_directory<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(ContentError::file_system(
                dir,
                FileOperation::Walk,
                std::io::Error::new(std::io::ErrorKind::NotFound, "provider directory does not exist"),
            ));
        }

        let loader = Self::new();
        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", dir.display(), e);
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy();
            if !entry.file_type().is_file() || !name.ends_with(PROVIDER_FILE_SUFFIX) {
                continue;
            }

            match Self::read_definition(entry.path()) {
                Ok(definition) => {
                    debug!("Loaded provider definition '{}' from {}", definition.provider_id, entry.path().display());
                    loader.add(definition);
                }
                Err(e) => warn!("Ignoring provider definition {}: {}", entry.path().display(), e),
            }
        }

        info!("Loaded {} provider definition(s) from {}", loader.len(), dir.display());
        Ok(loader)
    }

    fn read_definition(path: &Path) -> Result<ProviderDefinition> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ContentError::file_system(path, FileOperation::Read, e))?;
        let definition: ProviderDefinition = serde_json::from_str(&text).map_err(|source| ContentError::Json {
            context: path.display().to_string(),
            source,
        })?;
        definition.validate()?;
        Ok(definition)
    }

    /// Insert or replace a definition by provider id
    pub fn add(&self, definition: ProviderDefinition) {
        let mut definitions = self.definitions.write().unwrap_or_else(|p| p.into_inner());
        definitions.insert(definition.provider_id.clone(), definition);
    }

    pub fn len(&self) -> usize {
        self.definitions.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProviderDefinitionLoader for JsonProviderDefinitionLoader {
    fn get_provider(&self, provider_id: &str) -> Option<ProviderDefinition> {
        let definitions = self.definitions.read().unwrap_or_else(|p| p.into_inner());
        definitions.get(provider_id).cloned()
    }

    fn get_all_providers(&self) -> Vec<ProviderDefinition> {
        let definitions = self.definitions.read().unwrap_or_else(|p| p.into_inner());
        let mut all: Vec<_> = definitions.values().cloned().collect();
        all.sort_by(|a, b| a.provider_id.cmp(&b.provider_id));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const COMMUNITY_OUTPOST: &str = r#"{
        "providerId": "communityoutpost",
        "displayName": "Community Outpost",
        "publisherType": "CommunityOutpost",
        "discovererId": "communityoutpost",
        "resolverId": "genpatcher",
        "delivererId": "archive",
        "endpoints": {
            "baseUrl": "https://legi.cc/gp/",
            "catalogUrls": ["https://legi.cc/gp/dl.dat"]
        },
        "mirrorPreference": ["legi.cc"],
        "catalogPolicy": {}
    }"#;

    #[test]
    fn test_deserialize_applies_defaults() {
        let definition: ProviderDefinition = serde_json::from_str(COMMUNITY_OUTPOST).unwrap();
        assert!(definition.enabled);
        assert_eq!(definition.catalog_policy.excluded_code_prefixes, vec!["104", "108"]);
        assert_eq!(definition.timeouts.catalog_timeout(), Duration::from_secs(30));
        assert_eq!(definition.publisher_info().publisher_type, PublisherType::CommunityOutpost);
    }

    #[test]
    fn test_resolve_url() {
        let definition: ProviderDefinition = serde_json::from_str(COMMUNITY_OUTPOST).unwrap();
        assert_eq!(definition.resolve_url("files/gent.dat").unwrap(), "https://legi.cc/gp/files/gent.dat");
        assert_eq!(definition.resolve_url("https://other.host/a.zip").unwrap(), "https://other.host/a.zip");

        let bare = ProviderDefinition::new("x", "d", "r", "v");
        assert!(matches!(bare.resolve_url("a.zip"), Err(ContentError::Configuration { .. })));
    }

    #[test]
    fn test_catalog_policy() {
        let policy = CatalogPolicy::default();
        assert!(policy.is_excluded("104p"));
        assert!(policy.is_excluded("108E"));
        assert!(!policy.is_excluded("gent"));
        assert!(!CatalogPolicy::allow_all().is_excluded("104p"));
    }

    #[test]
    fn test_load_from_directory_skips_malformed_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("co.provider.json"), COMMUNITY_OUTPOST).unwrap();
        std::fs::write(dir.path().join("broken.provider.json"), "{ not json").unwrap();
        std::fs::write(dir.path().join("notes.json"), "{}").unwrap();

        let loader = JsonProviderDefinitionLoader::load_from_directory(dir.path()).unwrap();
        assert_eq!(loader.len(), 1);
        assert!(loader.get_provider("communityoutpost").is_some());
        assert!(loader.get_provider("missing").is_none());
    }
}
