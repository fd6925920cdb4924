//! Manifest validation: structure before delivery, staged files after
//!
//! Structural problems are errors. For staged files a missing file is an
//! error, while hash and size mismatches and files the manifest does not
//! list are warnings: identity by path and name is trusted over hashes.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::{ContentError, Result};
use crate::factory::scan_and_hash;
use crate::model::{normalize_relative_path, ContentManifest, ManifestFile};
use crate::services::FileHashProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    /// Relative path the issue is about, if any
    pub path: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    pub fn error<S: Into<String>>(path: Option<&str>, message: S) -> Self {
        Self {
            severity: IssueSeverity::Error,
            path: path.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn warning<S: Into<String>>(path: Option<&str>, message: S) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            path: path.map(str::to_string),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: {}", path, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationReport {
    pub manifest_id: String,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new<S: Into<String>>(manifest_id: S) -> Self {
        Self {
            manifest_id: manifest_id.into(),
            issues: Vec::new(),
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == IssueSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == IssueSeverity::Warning)
    }

    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    /// Fail on errors; log and drop warnings
    pub fn into_result(self) -> Result<()> {
        for warning in self.warnings() {
            warn!("Manifest '{}': {}", self.manifest_id, warning);
        }
        if self.is_valid() {
            return Ok(());
        }
        Err(ContentError::ManifestValidation {
            issues: self.errors().map(ToString::to_string).collect(),
            manifest_id: self.manifest_id,
        })
    }
}

fn is_safe_relative_path(path: &str) -> bool {
    let path = Path::new(path);
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Structural checks that need no file system access
pub fn validate_manifest_structure(manifest: &ContentManifest) -> ValidationReport {
    let mut report = ValidationReport::new(manifest.id.clone());

    if manifest.id.trim().is_empty() {
        report.issues.push(ValidationIssue::error(None, "manifest id is empty"));
    }
    if manifest.name.trim().is_empty() {
        report.issues.push(ValidationIssue::error(None, "manifest name is empty"));
    }
    if manifest.files.is_empty() {
        report.issues.push(ValidationIssue::error(None, "manifest lists no files"));
    }

    let mut seen = HashSet::new();
    for file in &manifest.files {
        let path = file.relative_path.as_str();
        if !is_safe_relative_path(&path.replace('\\', "/")) {
            report.issues.push(ValidationIssue::error(Some(path), "path is empty, absolute or escapes the content root"));
        }
        if !seen.insert(normalize_relative_path(path)) {
            report.issues.push(ValidationIssue::error(Some(path), "duplicate file path"));
        }
        if file.download_url.is_none() && file.source_path.is_none() {
            report.issues.push(ValidationIssue::error(Some(path), "file has neither a download URL nor a local source"));
        }
        if file.hash.as_deref().is_some_and(|h| h.trim().is_empty()) {
            report.issues.push(ValidationIssue::warning(Some(path), "hash is empty"));
        }
    }
    report
}

/// Checks staged files against their manifest, hashing in parallel
#[derive(Clone)]
pub struct ContentValidator {
    semaphore: Arc<Semaphore>,
    hasher: Arc<dyn FileHashProvider>,
}

impl ContentValidator {
    pub fn new(max_concurrent: usize, hasher: Arc<dyn FileHashProvider>) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            hasher,
        }
    }

    async fn check_file(
        hasher: Arc<dyn FileHashProvider>,
        file: ManifestFile,
        path: PathBuf,
        cancel: CancellationToken,
    ) -> Result<Vec<ValidationIssue>> {
        let relative = file.relative_path.as_str();
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => return Ok(vec![ValidationIssue::error(Some(relative), "file is missing")]),
        };

        let mut issues = Vec::new();
        if file.size > 0 && metadata.len() != file.size {
            issues.push(ValidationIssue::warning(
                Some(relative),
                format!("size is {} bytes, expected {}", metadata.len(), file.size),
            ));
        }
        if let Some(expected) = file.hash.as_deref().filter(|h| !h.is_empty()) {
            let actual = hasher.compute_file_hash(&path, &cancel).await?;
            if !actual.eq_ignore_ascii_case(expected) {
                issues.push(ValidationIssue::warning(
                    Some(relative),
                    format!("hash is {}, expected {}", actual, expected),
                ));
            }
        }
        Ok(issues)
    }

    /// Validate the files staged in `dir` for `manifest`
    pub async fn validate_staged(
        &self,
        manifest: &ContentManifest,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<ValidationReport> {
        let mut report = ValidationReport::new(manifest.id.clone());

        let mut handles = Vec::with_capacity(manifest.files.len());
        for file in manifest.files.iter().cloned() {
            let semaphore = self.semaphore.clone();
            let hasher = self.hasher.clone();
            let cancel = cancel.clone();
            let path = dir.join(&file.relative_path);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| ContentError::cancelled("validation"))?;
                Self::check_file(hasher, file, path, cancel).await
            }));
        }

        for handle in handles {
            let issues = handle.await.map_err(|e| ContentError::Delivery {
                manifest_id: manifest.id.clone(),
                reason: format!("validation task failed: {}", e),
            })??;
            report.issues.extend(issues);
        }

        let listed: HashSet<String> = manifest.files.iter().map(|f| normalize_relative_path(&f.relative_path)).collect();
        for extra in list_files(dir, cancel).await? {
            if !listed.contains(&normalize_relative_path(&extra)) {
                report.issues.push(ValidationIssue::warning(Some(&extra), "file is not listed in the manifest"));
            }
        }

        debug!(
            "Validated {} file(s) of {}: {} error(s), {} warning(s)",
            manifest.files.len(),
            manifest.id,
            report.errors().count(),
            report.warnings().count()
        );
        Ok(report)
    }
}

async fn list_files(dir: &Path, cancel: &CancellationToken) -> Result<Vec<String>> {
    if cancel.is_cancelled() {
        return Err(ContentError::cancelled(format!("list {}", dir.display())));
    }
    let root = dir.to_path_buf();
    let cancel = cancel.clone();
    tokio::task::spawn_blocking(move || {
        let mut files = Vec::new();
        for (index, entry) in walkdir::WalkDir::new(&root).sort_by_file_name().into_iter().enumerate() {
            if index % 128 == 0 && cancel.is_cancelled() {
                return Err(ContentError::cancelled(format!("list {}", root.display())));
            }
            let Ok(entry) = entry else { continue };
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&root) {
                let parts: Vec<_> = relative.components().map(|c| c.as_os_str().to_string_lossy()).collect();
                files.push(parts.join("/"));
            }
        }
        Ok(files)
    })
    .await
    .map_err(|e| ContentError::cancelled(format!("listing task failed: {}", e)))?
}

/// Hash every staged file and fill in missing hashes and sizes
pub async fn fill_missing_hashes(manifest: &mut ContentManifest, dir: &Path, cancel: &CancellationToken) -> Result<()> {
    if manifest.files.iter().all(|f| f.hash.is_some()) {
        return Ok(());
    }
    let scanned = scan_and_hash(dir, cancel).await?;
    for file in &mut manifest.files {
        let key = normalize_relative_path(&file.relative_path);
        if let Some(found) = scanned.iter().find(|s| normalize_relative_path(&s.relative_path) == key) {
            if file.hash.is_none() {
                file.hash = found.hash.clone();
            }
            if file.size == 0 {
                file.size = found.size;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentManifestBuilder;
    use crate::services::XxHashFileHashProvider;
    use tempfile::TempDir;

    fn validator() -> ContentValidator {
        ContentValidator::new(4, Arc::new(XxHashFileHashProvider::new()))
    }

    fn manifest_with(files: Vec<ManifestFile>) -> ContentManifest {
        ContentManifestBuilder::new()
            .with_basic_info("Validated", "1")
            .add_files(files)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_extraneous_file_is_one_warning() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"b").unwrap();

        let manifest = manifest_with(vec![ManifestFile::extracted("a.txt", dir.path().join("a.txt"), 1)]);
        let report = validator().validate_staged(&manifest, dir.path(), &CancellationToken::new()).await.unwrap();

        assert_eq!(report.errors().count(), 0);
        let warnings: Vec<_> = report.warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].path.as_deref(), Some("b.txt"));
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error_and_hash_mismatch_a_warning() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.big"), b"data").unwrap();

        let mut present = ManifestFile::extracted("a.big", dir.path().join("a.big"), 4);
        present.hash = Some("0000000000000000".to_string());
        let missing = ManifestFile::extracted("b.big", dir.path().join("b.big"), 1);

        let report = validator()
            .validate_staged(&manifest_with(vec![present, missing]), dir.path(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!report.is_valid());
        assert_eq!(report.errors().next().unwrap().path.as_deref(), Some("b.big"));
        assert_eq!(report.warnings().count(), 1);
        assert!(matches!(report.into_result(), Err(ContentError::ManifestValidation { .. })));
    }

    #[test]
    fn test_structure_rules() {
        let mut manifest = manifest_with(vec![ManifestFile::remote("../escape.big", "https://x.example/a.zip", 0)]);
        manifest.files.push(ManifestFile::default());
        let report = validate_manifest_structure(&manifest);
        assert!(report.errors().any(|i| i.path.as_deref() == Some("../escape.big")));
        assert!(report.errors().any(|i| i.message.contains("neither")));

        let empty = ContentManifestBuilder::new().with_basic_info("Empty", "1").build().unwrap();
        assert!(validate_manifest_structure(&empty).into_result().is_err());
    }

    #[tokio::test]
    async fn test_fill_missing_hashes() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.big"), b"data").unwrap();
        let mut manifest = manifest_with(vec![ManifestFile::extracted("a.big", dir.path().join("a.big"), 0)]);

        fill_missing_hashes(&mut manifest, dir.path(), &CancellationToken::new()).await.unwrap();
        assert_eq!(manifest.files[0].size, 4);
        assert!(manifest.files[0].hash.is_some());
    }
}
