//! Fully resolved content manifests

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::model::types::{
    ArchiveKind, ContentSourceType, ContentType, DependencyInstallBehavior, GameType,
    InstallTarget, PublisherType, WorkspaceStrategy,
};

/// Schema version of the manifest format; first segment of every generated id
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    MANIFEST_SCHEMA_VERSION
}

/// The installable description of one content unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentManifest {
    /// Format version of the stored manifest; older documents without it read as current
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub id: String,
    pub name: String,
    /// Display version as published
    pub version: String,
    /// Normalized numeric version (see [`crate::model::version::extract_manifest_version`])
    pub manifest_version: u32,
    pub content_type: ContentType,
    pub target_game: GameType,
    pub publisher: PublisherInfo,
    #[serde(default)]
    pub metadata: ContentMetadata,
    #[serde(default)]
    pub dependencies: Vec<ContentDependency>,
    #[serde(default)]
    pub files: Vec<ManifestFile>,
    #[serde(default)]
    pub installation_instructions: InstallationInstructions,
}

/// Who published the content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PublisherInfo {
    /// Stable identifier used in generated manifest ids
    pub id: String,
    pub name: String,
    pub website: Option<String>,
    pub support_url: Option<String>,
    pub publisher_type: PublisherType,
}

/// Descriptive metadata for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContentMetadata {
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub icon_url: Option<String>,
    pub cover_url: Option<String>,
    #[serde(default)]
    pub screenshot_urls: Vec<String>,
    pub changelog_url: Option<String>,
    pub release_date: Option<DateTime<Utc>>,
    /// Set when the resolver already knows the exact identity of a single-content
    /// archive; manifest factories then skip file-name heuristics
    pub identity_marker: Option<String>,
}

/// A dependency on other content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDependency {
    pub id: String,
    pub name: String,
    pub dependency_type: ContentType,
    pub install_behavior: DependencyInstallBehavior,
    pub min_version: Option<String>,
    pub max_version: Option<String>,
    /// Only one content of this dependency type may be active at once
    #[serde(default)]
    pub is_exclusive: bool,
    #[serde(default)]
    pub conflicts_with: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InstallationInstructions {
    pub workspace_strategy: WorkspaceStrategy,
}

/// One file within a manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ManifestFile {
    pub relative_path: String,
    pub hash: Option<String>,
    /// Size in bytes; 0 when unknown
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub is_executable: bool,
    #[serde(default)]
    pub is_required: bool,
    pub source_type: ContentSourceType,
    pub download_url: Option<String>,
    /// Ranked alternates tried after `download_url` fails
    #[serde(default)]
    pub mirror_urls: Vec<String>,
    /// Local staging path of the file, when it exists on disk
    pub source_path: Option<PathBuf>,
    pub archive_kind: Option<ArchiveKind>,
    #[serde(default)]
    pub install_target: InstallTarget,
}

impl ManifestFile {
    /// A file fetched from a remote URL
    pub fn remote<P: Into<String>, U: Into<String>>(relative_path: P, download_url: U, size: u64) -> Self {
        let download_url = download_url.into();
        Self {
            relative_path: relative_path.into(),
            size,
            is_required: true,
            source_type: ContentSourceType::RemoteDownload,
            archive_kind: ArchiveKind::from_file_name(&download_url),
            download_url: Some(download_url),
            ..Default::default()
        }
    }

    /// A file that already sits on disk after extraction
    pub fn extracted<P: Into<String>>(relative_path: P, source_path: PathBuf, size: u64) -> Self {
        Self {
            relative_path: relative_path.into(),
            size,
            is_required: true,
            source_type: ContentSourceType::ExtractedPackage,
            source_path: Some(source_path),
            ..Default::default()
        }
    }

    /// Archive format of this file, explicit tag first, URL extension second
    pub fn effective_archive_kind(&self) -> Option<ArchiveKind> {
        self.archive_kind.or_else(|| {
            self.download_url
                .as_deref()
                .and_then(ArchiveKind::from_file_name)
        })
    }

    /// Advance the source type; backward transitions are refused
    pub fn transition_source_type(&mut self, next: ContentSourceType) -> bool {
        if self.source_type.can_transition_to(next) {
            self.source_type = next;
            true
        } else {
            false
        }
    }

    /// Every URL worth trying, primary first
    pub fn candidate_urls(&self) -> Vec<String> {
        let mut urls = Vec::with_capacity(1 + self.mirror_urls.len());
        if let Some(url) = &self.download_url {
            urls.push(url.clone());
        }
        for mirror in &self.mirror_urls {
            if !urls.contains(mirror) {
                urls.push(mirror.clone());
            }
        }
        urls
    }
}

/// Normalize a relative path for identity comparisons (separator and case insensitive)
pub fn normalize_relative_path(path: &str) -> String {
    path.replace('\\', "/")
        .trim_start_matches("./")
        .trim_start_matches('/')
        .to_lowercase()
}

impl ContentManifest {
    /// Files that carry a download URL
    pub fn downloadable_files(&self) -> impl Iterator<Item = &ManifestFile> {
        self.files.iter().filter(|f| f.download_url.is_some())
    }

    /// First relative path shared by two files matching `filter`
    pub fn find_duplicate_path<F>(&self, filter: F) -> Option<String>
    where
        F: Fn(&ManifestFile) -> bool,
    {
        let mut seen = HashSet::new();
        self.files
            .iter()
            .filter(|f| filter(f))
            .find(|f| !seen.insert(normalize_relative_path(&f.relative_path)))
            .map(|f| f.relative_path.clone())
    }

    /// Flip every file to content-addressable after the pool accepted the manifest
    pub fn mark_content_addressable(&mut self) {
        for file in &mut self.files {
            file.transition_source_type(ContentSourceType::ContentAddressable);
        }
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// Lowercase a name into an id segment, keeping only ASCII letters and digits
pub fn normalize_id_segment(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Deterministic manifest id: `schema.version.publisher.contenttype.name`
pub fn generate_publisher_content_id(
    publisher_id: &str,
    content_type: ContentType,
    content_name: &str,
    numeric_version: u32,
) -> String {
    let publisher = normalize_id_segment(publisher_id);
    let name = normalize_id_segment(content_name);
    format!(
        "{}.{}.{}.{}.{}",
        MANIFEST_SCHEMA_VERSION,
        numeric_version,
        if publisher.is_empty() { "unknown".to_string() } else { publisher },
        content_type.slug(),
        if name.is_empty() { "content".to_string() } else { name },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_publisher_content_id() {
        let id = generate_publisher_content_id("Community Outpost", ContentType::Patch, "patch104polish", 104);
        assert_eq!(id, "1.104.communityoutpost.patch.patch104polish");
    }

    #[test]
    fn test_remote_file_infers_archive_kind() {
        let file = ManifestFile::remote("gent.dat", "https://mirror.example/gent.dat", 10);
        assert_eq!(file.effective_archive_kind(), Some(ArchiveKind::SevenZip));
        assert_eq!(file.source_type, ContentSourceType::RemoteDownload);
    }

    #[test]
    fn test_candidate_urls_deduplicates_mirrors() {
        let mut file = ManifestFile::remote("a.zip", "https://a/a.zip", 0);
        file.mirror_urls = vec!["https://b/a.zip".into(), "https://a/a.zip".into()];
        assert_eq!(file.candidate_urls(), vec!["https://a/a.zip".to_string(), "https://b/a.zip".to_string()]);
    }

    #[test]
    fn test_find_duplicate_path_is_case_and_separator_insensitive() {
        let manifest = ContentManifest {
            schema_version: MANIFEST_SCHEMA_VERSION,
            id: "m".into(),
            name: "m".into(),
            version: "1".into(),
            manifest_version: 1,
            content_type: ContentType::Mod,
            target_game: GameType::ZeroHour,
            publisher: PublisherInfo::default(),
            metadata: ContentMetadata::default(),
            dependencies: vec![],
            files: vec![
                ManifestFile::remote("Data\\INI\\x.big", "https://a/1", 1),
                ManifestFile::remote("data/ini/X.big", "https://a/2", 1),
            ],
            installation_instructions: InstallationInstructions::default(),
        };
        assert_eq!(manifest.find_duplicate_path(|_| true), Some("data/ini/X.big".to_string()));
    }

    #[test]
    fn test_schema_version_is_stored_and_defaulted() {
        let manifest = crate::model::ContentManifestBuilder::new()
            .with_basic_info("Shockwave", "1.2")
            .build()
            .unwrap();
        assert_eq!(manifest.schema_version, MANIFEST_SCHEMA_VERSION);

        let mut json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["schemaVersion"], MANIFEST_SCHEMA_VERSION);
        assert_eq!(json["manifestVersion"], 12);

        json.as_object_mut().unwrap().remove("schemaVersion");
        let legacy: ContentManifest = serde_json::from_value(json).unwrap();
        assert_eq!(legacy.schema_version, MANIFEST_SCHEMA_VERSION);
        assert_eq!(legacy.id, manifest.id);
    }

    #[test]
    fn test_mark_content_addressable_is_forward_only() {
        let mut file = ManifestFile::remote("x", "https://a/x", 0);
        assert!(file.transition_source_type(ContentSourceType::ContentAddressable));
        assert!(!file.transition_source_type(ContentSourceType::RemoteDownload));
        assert_eq!(file.source_type, ContentSourceType::ContentAddressable);
    }
}
