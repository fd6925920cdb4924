//! Builder for content manifests
//!
//! A builder accumulates file state, so resolvers create a new one for every
//! resolution and consume it with [`ContentManifestBuilder::build`].

use crate::core::{ContentError, Result};
use crate::model::manifest::{
    generate_publisher_content_id, ContentDependency, ContentManifest, ContentMetadata,
    InstallationInstructions, ManifestFile, PublisherInfo, MANIFEST_SCHEMA_VERSION,
};
use crate::model::types::{ContentType, GameType, WorkspaceStrategy};
use crate::model::version::{extract_manifest_version, manifest_version_number};

#[derive(Debug, Default)]
pub struct ContentManifestBuilder {
    id: Option<String>,
    name: String,
    version: String,
    content_type: ContentType,
    target_game: GameType,
    publisher: PublisherInfo,
    metadata: ContentMetadata,
    dependencies: Vec<ContentDependency>,
    files: Vec<ManifestFile>,
    workspace_strategy: Option<WorkspaceStrategy>,
}

impl ContentManifestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_basic_info<N: Into<String>, V: Into<String>>(mut self, name: N, version: V) -> Self {
        self.name = name.into();
        self.version = version.into();
        self
    }

    /// Use a fixed id instead of the generated publisher content id
    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_content_type(mut self, content_type: ContentType, target_game: GameType) -> Self {
        self.content_type = content_type;
        self.target_game = target_game;
        self
    }

    pub fn with_publisher(mut self, publisher: PublisherInfo) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn with_metadata(mut self, metadata: ContentMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.metadata.description = description.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            if !self.metadata.tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
                self.metadata.tags.push(tag);
            }
        }
        self
    }

    pub fn with_identity_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.metadata.identity_marker = Some(marker.into());
        self
    }

    pub fn with_dependency(mut self, dependency: ContentDependency) -> Self {
        if !self.dependencies.iter().any(|d| d.id == dependency.id) {
            self.dependencies.push(dependency);
        }
        self
    }

    pub fn with_dependencies<I: IntoIterator<Item = ContentDependency>>(mut self, dependencies: I) -> Self {
        for dependency in dependencies {
            self = self.with_dependency(dependency);
        }
        self
    }

    pub fn add_file(mut self, file: ManifestFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn add_files<I: IntoIterator<Item = ManifestFile>>(mut self, files: I) -> Self {
        self.files.extend(files);
        self
    }

    pub fn with_workspace_strategy(mut self, strategy: WorkspaceStrategy) -> Self {
        self.workspace_strategy = Some(strategy);
        self
    }

    /// Finish the manifest, rejecting a missing name and duplicate file paths
    pub fn build(self) -> Result<ContentManifest> {
        if self.name.trim().is_empty() {
            return Err(ContentError::ManifestValidation {
                manifest_id: self.id.unwrap_or_default(),
                issues: vec!["manifest name is empty".to_string()],
            });
        }

        let manifest_version = manifest_version_number(&self.version);
        let version = if self.version.trim().is_empty() {
            extract_manifest_version(&self.version)
        } else {
            self.version
        };
        let id = self.id.unwrap_or_else(|| {
            generate_publisher_content_id(&self.publisher.id, self.content_type, &self.name, manifest_version)
        });

        // Executable content replaces the workspace; everything else layers over it
        let workspace_strategy = self.workspace_strategy.unwrap_or(if self.content_type.is_executable_content() {
            WorkspaceStrategy::HybridCopySymlink
        } else {
            WorkspaceStrategy::SymlinkOnly
        });

        let manifest = ContentManifest {
            schema_version: MANIFEST_SCHEMA_VERSION,
            id,
            name: self.name,
            version,
            manifest_version,
            content_type: self.content_type,
            target_game: self.target_game,
            publisher: self.publisher,
            metadata: self.metadata,
            dependencies: self.dependencies,
            files: self.files,
            installation_instructions: InstallationInstructions { workspace_strategy },
        };

        if let Some(path) = manifest.find_duplicate_path(|_| true) {
            return Err(ContentError::DuplicateFilePath {
                manifest_id: manifest.id,
                path,
            });
        }

        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::PublisherType;

    fn publisher() -> PublisherInfo {
        PublisherInfo {
            id: "communityoutpost".into(),
            name: "Community Outpost".into(),
            publisher_type: PublisherType::CommunityOutpost,
            ..Default::default()
        }
    }

    #[test]
    fn test_build_generates_id_and_numeric_version() {
        let manifest = ContentManifestBuilder::new()
            .with_basic_info("GenTool", "7.9")
            .with_content_type(ContentType::Addon, GameType::ZeroHour)
            .with_publisher(publisher())
            .add_file(ManifestFile::remote("gent.dat", "https://x/gent.dat", 100))
            .build()
            .unwrap();

        assert_eq!(manifest.id, "1.79.communityoutpost.addon.gentool");
        assert_eq!(manifest.manifest_version, 79);
        assert_eq!(manifest.installation_instructions.workspace_strategy, WorkspaceStrategy::SymlinkOnly);
    }

    #[test]
    fn test_build_rejects_duplicate_paths() {
        let result = ContentManifestBuilder::new()
            .with_basic_info("Mod", "1.0")
            .with_publisher(publisher())
            .add_file(ManifestFile::remote("x.big", "https://x/1.zip", 1))
            .add_file(ManifestFile::remote("x.big", "https://x/2.zip", 1))
            .build();

        assert!(matches!(result, Err(ContentError::DuplicateFilePath { path, .. }) if path == "x.big"));
    }

    #[test]
    fn test_build_requires_name() {
        assert!(ContentManifestBuilder::new().build().is_err());
    }

    #[test]
    fn test_dependencies_are_deduplicated_by_id() {
        let dependency = ContentDependency {
            id: "1.108.communityoutpost.patch.patch108".into(),
            name: "Zero Hour 1.08".into(),
            dependency_type: ContentType::GameClient,
            install_behavior: Default::default(),
            min_version: None,
            max_version: None,
            is_exclusive: false,
            conflicts_with: vec![],
        };
        let manifest = ContentManifestBuilder::new()
            .with_basic_info("Hotkeys", "1")
            .with_dependency(dependency.clone())
            .with_dependency(dependency)
            .build()
            .unwrap();
        assert_eq!(manifest.dependencies.len(), 1);
    }
}
