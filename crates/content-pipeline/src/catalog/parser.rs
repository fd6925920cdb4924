//! Parser for the line-oriented content catalog
//!
//! ```text
//! 2.13          ;;
//! gent 000123456 legi.cc    https://legi.cc/gp/gent.dat
//! gent 000123456 gentool    https://gentool.net/gp/gent.dat
//! ```
//!
//! The first line may carry a version header; every other line names a
//! four character alphanumeric content code, a zero-padded size, a mirror name and a URL.
//! Lines sharing a code describe mirrors of the same item.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::mirrors::{rank_mirrors, CatalogMirror};
use crate::catalog::registry::{self, ContentCategory};
use crate::core::{ProviderDefinition, Result};
use crate::model::{
    generate_publisher_content_id, manifest_version_number, ContentSearchResult, ContentType, SearchPayload,
};

static HEADER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([\d.]+)\s+;;$").expect("valid catalog header regex"));

static CONTENT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z0-9]{4})\s+(\d+)\s+(\S+)\s+(\S+)$").expect("valid catalog line regex"));

/// Resolver metadata keys written by the catalog parser
pub mod metadata_keys {
    pub const CONTENT_CODE: &str = "contentCode";
    pub const CATALOG_VERSION: &str = "catalogVersion";
    pub const FILE_SIZE: &str = "fileSize";
    pub const DOWNLOAD_URL: &str = "downloadUrl";
    pub const MIRRORS: &str = "mirrors";
    pub const LANGUAGE: &str = "language";
}

/// One content code with every mirror listed for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub content_code: String,
    pub file_size: u64,
    pub mirrors: Vec<CatalogMirror>,
}

/// Raw catalog after the grouping phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub version: Option<String>,
    /// First-seen order of content codes
    pub items: Vec<CatalogItem>,
}

/// Group catalog lines by content code; unrecognized lines are skipped
pub fn parse_catalog_document(text: &str) -> Catalog {
    let mut catalog = Catalog::default();
    let mut seen_first_line = false;

    for (index, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim_end_matches('\r').trim();
        if line.is_empty() {
            continue;
        }

        if !seen_first_line {
            seen_first_line = true;
            if let Some(caps) = HEADER_LINE.captures(line) {
                catalog.version = Some(caps[1].to_string());
                continue;
            }
        }

        let Some(caps) = CONTENT_LINE.captures(line) else {
            debug!("Skipping unrecognized catalog line {}: '{}'", index + 1, line);
            continue;
        };

        let code = caps[1].to_ascii_lowercase();
        let size = caps[2].parse::<u64>().unwrap_or(0);
        let mirror = CatalogMirror::new(&caps[3], &caps[4]);

        match catalog.items.iter_mut().find(|item| item.content_code == code) {
            Some(item) => {
                if item.file_size == 0 {
                    item.file_size = size;
                }
                if !item.mirrors.contains(&mirror) {
                    item.mirrors.push(mirror);
                }
            }
            None => catalog.items.push(CatalogItem {
                content_code: code,
                file_size: size,
                mirrors: vec![mirror],
            }),
        }
    }

    catalog
}

/// Turns catalog text into search results for one provider
#[derive(Debug, Default, Clone, Copy)]
pub struct CatalogParser;

impl CatalogParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse and filter a catalog; degenerate input yields an empty list
    pub fn parse(&self, catalog_text: &str, definition: &ProviderDefinition) -> Result<Vec<ContentSearchResult>> {
        let catalog = parse_catalog_document(catalog_text);
        let catalog_version = catalog.version.clone().unwrap_or_else(|| "0".to_string());

        let mut results = Vec::with_capacity(catalog.items.len());
        for item in catalog.items {
            if let Some(result) = self.to_search_result(item, &catalog_version, definition) {
                results.push(result);
            }
        }

        debug!("Catalog for '{}' yielded {} item(s)", definition.provider_id, results.len());
        Ok(results)
    }

    fn to_search_result(
        &self,
        item: CatalogItem,
        catalog_version: &str,
        definition: &ProviderDefinition,
    ) -> Option<ContentSearchResult> {
        let info = registry::lookup(&item.content_code);
        if info.content_type == ContentType::Unknown {
            debug!("Skipping catalog code '{}' with unknown content type", item.content_code);
            return None;
        }
        if definition.catalog_policy.is_excluded(&item.content_code) {
            debug!("Skipping catalog code '{}' excluded by catalog policy", item.content_code);
            return None;
        }

        let mut absolute = Vec::with_capacity(item.mirrors.len());
        for mirror in &item.mirrors {
            match definition.resolve_url(&mirror.url) {
                Ok(url) => absolute.push(CatalogMirror::new(mirror.name.clone(), url)),
                Err(e) => {
                    warn!("Keeping unresolved mirror '{}' of '{}': {}", mirror.name, item.content_code, e);
                    absolute.push(mirror.clone());
                }
            }
        }

        let ranked = rank_mirrors(&absolute, &definition.mirror_preference, &definition.endpoint_priority);
        let Some(preferred) = ranked.first().cloned() else {
            warn!("Discarding catalog code '{}': no mirrors listed", item.content_code);
            return None;
        };

        let mut result = ContentSearchResult::new(
            generate_publisher_content_id(
                &definition.provider_id,
                info.content_type,
                &info.name,
                manifest_version_number(catalog_version),
            ),
            info.display_name.clone(),
            definition.provider_id.clone(),
        );
        result.description = info.description.clone();
        result.version = catalog_version.to_string();
        result.content_type = info.content_type;
        result.target_game = info.target_game;
        result.author_name = definition.display_name.clone();
        result.source_url = Some(preferred.url.clone());
        result.download_size = (item.file_size > 0).then_some(item.file_size);
        result.requires_resolution = true;
        result.resolver_id = Some(definition.resolver_id.clone());

        result.add_tags(&definition.default_tags);
        result.add_tag(info.content_type.slug());
        if info.category == ContentCategory::OfficialPatch {
            result.add_tag("official");
        }
        if let Some(language) = info.language {
            result.add_tag(language);
            result.set_metadata(metadata_keys::LANGUAGE, language);
        }

        result.set_metadata(metadata_keys::CONTENT_CODE, item.content_code.clone());
        result.set_metadata(metadata_keys::CATALOG_VERSION, catalog_version);
        result.set_metadata(metadata_keys::FILE_SIZE, item.file_size.to_string());
        result.set_metadata(metadata_keys::DOWNLOAD_URL, preferred.url.clone());
        match serde_json::to_string(&ranked) {
            Ok(json) => result.set_metadata(metadata_keys::MIRRORS, json),
            Err(e) => warn!("Failed to serialize mirrors of '{}': {}", item.content_code, e),
        }

        result.data = SearchPayload::CatalogItem(CatalogItem {
            content_code: item.content_code,
            file_size: item.file_size,
            mirrors: ranked,
        });
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CatalogPolicy;
    use crate::model::GameType;

    const CATALOG: &str = "2.13          ;;\r\n\
gent 000123456 legi.cc    https://legi.cc/gp/gent.dat\r\n\
GENT 000123456 gentool    https://gentool.net/gp/gent.dat\r\n\
this line is garbage\r\n\
104p 001000000 legi.cc    https://legi.cc/gp/104p.dat\r\n\
vc08 000005000 legi.cc    https://legi.cc/gp/vc08.dat\r\n\
cbbs 000200000 legi.cc    files/cbbs.dat\r\n";

    fn definition() -> ProviderDefinition {
        let mut definition = ProviderDefinition::new("communityoutpost", "communityoutpost", "genpatcher", "archive");
        definition.endpoints.base_url = Some("https://legi.cc/gp/".to_string());
        definition.default_tags = vec!["community".to_string()];
        definition
    }

    #[test]
    fn test_grouping_preserves_first_seen_order() {
        let catalog = parse_catalog_document(CATALOG);
        assert_eq!(catalog.version.as_deref(), Some("2.13"));
        let codes: Vec<_> = catalog.items.iter().map(|i| i.content_code.as_str()).collect();
        assert_eq!(codes, vec!["gent", "104p", "vc08", "cbbs"]);
        assert_eq!(catalog.items[0].mirrors.len(), 2);
        assert_eq!(catalog.items[0].file_size, 123456);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let parser = CatalogParser::new();
        let first = parser.parse(CATALOG, &definition()).unwrap();
        let second = parser.parse(CATALOG, &definition()).unwrap();

        let ids = |r: &[ContentSearchResult]| r.iter().map(|i| i.id.clone()).collect::<Vec<_>>();
        let mirrors = |r: &[ContentSearchResult]| {
            r.iter().map(|i| i.metadata(metadata_keys::MIRRORS).map(str::to_string)).collect::<Vec<_>>()
        };
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(mirrors(&first), mirrors(&second));
    }

    #[test]
    fn test_parse_filters_unknown_and_official_patches() {
        let results = CatalogParser::new().parse(CATALOG, &definition()).unwrap();
        let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["GenTool", "Control Bar Basic"]);

        let mut permissive = definition();
        permissive.catalog_policy = CatalogPolicy::allow_all();
        let results = CatalogParser::new().parse(CATALOG, &permissive).unwrap();
        assert!(results.iter().any(|r| r.resolver_metadata.get("contentCode").map(String::as_str) == Some("104p")));
        assert!(results.iter().all(|r| r.content_type != ContentType::Unknown));
    }

    #[test]
    fn test_relative_urls_are_made_absolute() {
        let results = CatalogParser::new().parse(CATALOG, &definition()).unwrap();
        let control_bar = results.iter().find(|r| r.name == "Control Bar Basic").unwrap();
        assert_eq!(control_bar.source_url.as_deref(), Some("https://legi.cc/gp/files/cbbs.dat"));
    }

    #[test]
    fn test_relative_urls_without_base_keep_the_item() {
        let mut definition = definition();
        definition.endpoints.base_url = None;
        let results = CatalogParser::new().parse("gent 000000010 legi.cc gp/gent.dat\n", &definition).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source_url.as_deref(), Some("gp/gent.dat"));
        assert_eq!(results[0].metadata(metadata_keys::DOWNLOAD_URL), Some("gp/gent.dat"));
    }

    #[test]
    fn test_content_codes_must_be_alphanumeric() {
        let catalog = parse_catalog_document("gen_ 000000010 legi.cc https://legi.cc/gp/gen_.dat\n\
gént 000000010 legi.cc https://legi.cc/gp/gent.dat\n\
gent 000000010 legi.cc https://legi.cc/gp/gent.dat\n");
        let codes: Vec<_> = catalog.items.iter().map(|i| i.content_code.as_str()).collect();
        assert_eq!(codes, vec!["gent"]);
    }

    #[test]
    fn test_mirror_preference_selects_download_url() {
        let catalog = "gent 000000010 A u1\ngent 000000010 B u2\n";
        let mut definition = definition();
        definition.endpoints.base_url = None;
        definition.mirror_preference = vec!["B".to_string()];

        let catalog = catalog.replace(" u1", " https://a.example/u1").replace(" u2", " https://b.example/u2");
        let results = CatalogParser::new().parse(&catalog, &definition).unwrap();
        assert_eq!(results[0].metadata(metadata_keys::DOWNLOAD_URL), Some("https://b.example/u2"));
        assert_eq!(results[0].target_game, GameType::ZeroHour);
    }

    #[test]
    fn test_degenerate_catalogs_are_empty() {
        let parser = CatalogParser::new();
        assert!(parser.parse("", &definition()).unwrap().is_empty());
        assert!(parser.parse("<html>not a catalog</html>", &definition()).unwrap().is_empty());
        assert!(parser.parse("2.13 ;;\n", &definition()).unwrap().is_empty());
    }
}
