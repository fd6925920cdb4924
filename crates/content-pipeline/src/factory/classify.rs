//! File-level heuristics over extracted trees
//!
//! Two independent classifiers: one buckets files into content types, the
//! other decides where a single file is installed.

use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use walkdir::WalkDir;

use crate::core::{ContentError, FileOperation, Result};
use crate::model::{ContentType, InstallTarget};
use crate::services::hash_file_blocking;

const SCREENSHOT_EXTENSIONS: [&str; 5] = ["bmp", "jpg", "jpeg", "png", "tga"];
const GAME_NAMES: [&str; 5] = ["generals", "zerohour", "zero_hour", "zero hour", "game"];
const CANCEL_CHECK_INTERVAL: usize = 128;

/// Content bucket a file contributes to in a multi-content archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentBucket {
    GameClient,
    Addon,
    Patch,
}

impl ContentBucket {
    pub const ALL: [ContentBucket; 3] = [ContentBucket::GameClient, ContentBucket::Addon, ContentBucket::Patch];

    pub fn content_type(&self) -> ContentType {
        match self {
            ContentBucket::GameClient => ContentType::GameClient,
            ContentBucket::Addon => ContentType::Addon,
            ContentBucket::Patch => ContentType::Patch,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContentBucket::GameClient => "Game Client",
            ContentBucket::Addon => "Addons",
            ContentBucket::Patch => "Patch",
        }
    }
}

fn extension(path: &str) -> String {
    Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

fn file_name(path: &str) -> String {
    path.rsplit(['/', '\\']).next().unwrap_or(path).to_ascii_lowercase()
}

fn has_dir(path: &str, dir: &str) -> bool {
    let normalized = path.replace('\\', "/").to_ascii_lowercase();
    normalized.starts_with(&format!("{}/", dir)) || normalized.contains(&format!("/{}/", dir))
}

/// Executable whose name mentions the game
pub fn is_game_executable(relative_path: &str) -> bool {
    let name = file_name(relative_path);
    extension(&name) == "exe" && GAME_NAMES.iter().any(|g| name.contains(g))
}

fn is_addon_name(name: &str) -> bool {
    let tokens: Vec<&str> = name.split(|c: char| !c.is_ascii_alphanumeric()).collect();
    name.contains("hotkey")
        || name.contains("keyboard")
        || name.contains("controlbar")
        || name.contains("commandbar")
        || tokens.contains(&"ui")
}

/// Bucket of one file, `None` when no rule matches
pub fn classify_bucket(relative_path: &str) -> Option<ContentBucket> {
    let name = file_name(relative_path);
    if is_game_executable(&name) {
        return Some(ContentBucket::GameClient);
    }
    if is_addon_name(&name) {
        return Some(ContentBucket::Addon);
    }
    match extension(&name).as_str() {
        "dll" | "big" | "ini" => Some(ContentBucket::Patch),
        _ => None,
    }
}

/// Where one file is installed
pub fn classify_install_target(relative_path: &str, default: InstallTarget) -> InstallTarget {
    let ext = extension(relative_path);
    if ext == "map" || has_dir(relative_path, "maps") {
        InstallTarget::UserMapsDirectory
    } else if ext == "rep" || has_dir(relative_path, "replays") {
        InstallTarget::UserReplaysDirectory
    } else if has_dir(relative_path, "screenshots") && SCREENSHOT_EXTENSIONS.contains(&ext.as_str()) {
        InstallTarget::UserScreenshotsDirectory
    } else if matches!(ext.as_str(), "big" | "ini" | "exe" | "dll") || has_dir(relative_path, "data") {
        InstallTarget::Workspace
    } else {
        default
    }
}

/// One regular file found below an extraction root
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedFile {
    /// Forward-slash path relative to the scan root
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub size: u64,
    pub hash: Option<String>,
}

fn scan_blocking(root: &Path, cancel: &CancellationToken) -> Result<Vec<ScannedFile>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for (index, entry) in WalkDir::new(root).follow_links(false).sort_by_file_name().into_iter().enumerate() {
        if index % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return Err(ContentError::cancelled(format!("scan {}", root.display())));
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let relative_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let size = entry
            .metadata()
            .map(|m| m.len())
            .map_err(|e| ContentError::file_system(entry.path(), FileOperation::Metadata, e.into()))?;

        files.push(ScannedFile {
            relative_path,
            absolute_path: entry.path().to_path_buf(),
            size,
            hash: None,
        });
    }
    Ok(files)
}

/// Walk `root` and hash every file; a missing root yields no files
pub async fn scan_and_hash(root: &Path, cancel: &CancellationToken) -> Result<Vec<ScannedFile>> {
    let root = root.to_path_buf();
    let cancel = cancel.clone();

    tokio::task::spawn_blocking(move || {
        let mut files = scan_blocking(&root, &cancel)?;
        let hashes: Vec<Result<String>> = files.par_iter().map(|f| hash_file_blocking(&f.absolute_path)).collect();
        for (file, hash) in files.iter_mut().zip(hashes) {
            file.hash = Some(hash?);
        }
        Ok(files)
    })
    .await
    .map_err(|e| ContentError::file_system(
        PathBuf::from("<extracted content>"),
        FileOperation::Walk,
        std::io::Error::other(format!("scan task failed: {}", e)),
    ))?
}

/// Deepest directory containing every path, as a relative forward-slash prefix
pub fn common_parent<'a, I: IntoIterator<Item = &'a str>>(paths: I) -> String {
    let mut common: Option<Vec<&str>> = None;
    for path in paths {
        let mut parts: Vec<&str> = path.split('/').collect();
        parts.pop();
        common = Some(match common {
            None => parts,
            Some(prefix) => prefix.iter().zip(&parts).take_while(|(a, b)| a == b).map(|(a, _)| *a).collect(),
        });
    }
    common.unwrap_or_default().join("/")
}

/// `path` relative to the `root` prefix; unchanged when outside it
pub fn strip_root<'a>(path: &'a str, root: &str) -> &'a str {
    if root.is_empty() {
        return path;
    }
    path.strip_prefix(root).and_then(|rest| rest.strip_prefix('/')).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_install_targets() {
        let default = InstallTarget::Workspace;
        assert_eq!(classify_install_target("maps/custom.map", default), InstallTarget::UserMapsDirectory);
        assert_eq!(classify_install_target("Maps/Desert/desert.tga", default), InstallTarget::UserMapsDirectory);
        assert_eq!(classify_install_target("data/rules.big", InstallTarget::UserMapsDirectory), InstallTarget::Workspace);
        assert_eq!(classify_install_target("last.rep", default), InstallTarget::UserReplaysDirectory);
        assert_eq!(classify_install_target("screenshots/shot1.png", default), InstallTarget::UserScreenshotsDirectory);
        assert_eq!(classify_install_target("readme.txt", InstallTarget::UserMapsDirectory), InstallTarget::UserMapsDirectory);
    }

    #[test]
    fn test_buckets() {
        assert_eq!(classify_bucket("generals.exe"), Some(ContentBucket::GameClient));
        assert_eq!(classify_bucket("tools/setup.exe"), None);
        assert_eq!(classify_bucket("hotkeys.ini"), Some(ContentBucket::Addon));
        assert_eq!(classify_bucket("Data/ControlBarHD.big"), Some(ContentBucket::Addon));
        assert_eq!(classify_bucket("ui_english.big"), Some(ContentBucket::Addon));
        assert_eq!(classify_bucket("build.ini"), Some(ContentBucket::Patch));
        assert_eq!(classify_bucket("patch.dll"), Some(ContentBucket::Patch));
        assert_eq!(classify_bucket("readme.txt"), None);
    }

    #[test]
    fn test_common_parent() {
        assert_eq!(common_parent(["ZH/Data/a.big", "ZH/Data/b.big"]), "ZH/Data");
        assert_eq!(common_parent(["ZH/a.big", "CCG/b.big"]), "");
        assert_eq!(strip_root("ZH/Data/a.big", "ZH"), "Data/a.big");
        assert_eq!(strip_root("a.big", ""), "a.big");
    }

    #[tokio::test]
    async fn test_scan_and_hash() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("Data")).unwrap();
        std::fs::write(dir.path().join("Data").join("a.big"), b"aaaa").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"b").unwrap();

        let files = scan_and_hash(dir.path(), &CancellationToken::new()).await.unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["Data/a.big", "b.txt"]);
        assert_eq!(files[0].size, 4);
        assert!(files.iter().all(|f| f.hash.as_ref().is_some_and(|h| h.len() == 16)));

        let missing = scan_and_hash(&dir.path().join("nope"), &CancellationToken::new()).await.unwrap();
        assert!(missing.is_empty());
    }
}
