//! Enumerations shared by search results and manifests

use serde::{Deserialize, Serialize};

/// Kind of installable content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ContentType {
    GameClient,
    Mod,
    Patch,
    Addon,
    Map,
    MapPack,
    Skin,
    LanguagePack,
    ModdingTool,
    Video,
    Mission,
    #[default]
    Unknown,
}

impl ContentType {
    /// Lowercase identifier used inside generated manifest ids
    pub fn slug(&self) -> &'static str {
        match self {
            ContentType::GameClient => "gameclient",
            ContentType::Mod => "mod",
            ContentType::Patch => "patch",
            ContentType::Addon => "addon",
            ContentType::Map => "map",
            ContentType::MapPack => "mappack",
            ContentType::Skin => "skin",
            ContentType::LanguagePack => "languagepack",
            ContentType::ModdingTool => "moddingtool",
            ContentType::Video => "video",
            ContentType::Mission => "mission",
            ContentType::Unknown => "unknown",
        }
    }

    /// Where files of this content type land when no path rule applies
    pub fn default_install_target(&self) -> InstallTarget {
        match self {
            ContentType::Map | ContentType::MapPack | ContentType::Mission => InstallTarget::UserMapsDirectory,
            _ => InstallTarget::Workspace,
        }
    }

    /// Content types that ship a game executable and replace the workspace
    pub fn is_executable_content(&self) -> bool {
        matches!(self, ContentType::GameClient | ContentType::Mod)
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Game a piece of content targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum GameType {
    Generals,
    ZeroHour,
    #[default]
    Unknown,
}

impl GameType {
    pub fn slug(&self) -> &'static str {
        match self {
            GameType::Generals => "generals",
            GameType::ZeroHour => "zerohour",
            GameType::Unknown => "unknown",
        }
    }

    /// Conventional folder name used by multi-game archives
    pub fn archive_folder(&self) -> Option<&'static str> {
        match self {
            GameType::Generals => Some("CCG"),
            GameType::ZeroHour => Some("ZH"),
            GameType::Unknown => None,
        }
    }
}

/// Discriminator for the publisher behind a manifest; picks the manifest factory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PublisherType {
    CommunityOutpost,
    GitHub,
    ModDb,
    CncLabs,
    LocalFileSystem,
    #[default]
    Other,
}

impl PublisherType {
    pub fn slug(&self) -> &'static str {
        match self {
            PublisherType::CommunityOutpost => "communityoutpost",
            PublisherType::GitHub => "github",
            PublisherType::ModDb => "moddb",
            PublisherType::CncLabs => "cnclabs",
            PublisherType::LocalFileSystem => "local",
            PublisherType::Other => "other",
        }
    }
}

/// Where a manifest file currently comes from
///
/// Transitions only move forward: a remote or extracted file becomes
/// content-addressable once stored, never the other way round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ContentSourceType {
    #[default]
    RemoteDownload,
    ExtractedPackage,
    ContentAddressable,
}

impl ContentSourceType {
    fn rank(&self) -> u8 {
        match self {
            ContentSourceType::RemoteDownload => 0,
            ContentSourceType::ExtractedPackage => 1,
            ContentSourceType::ContentAddressable => 2,
        }
    }

    pub fn can_transition_to(&self, next: ContentSourceType) -> bool {
        next.rank() >= self.rank()
    }
}

/// Install-time placement of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum InstallTarget {
    #[default]
    Workspace,
    UserMapsDirectory,
    UserReplaysDirectory,
    UserScreenshotsDirectory,
}

/// Archive container format of a downloadable file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchiveKind {
    Zip,
    /// 7z containers, including catalog `.dat` files that are 7z archives in disguise
    SevenZip,
}

impl ArchiveKind {
    /// Infer the archive kind from a file name or URL
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let lower = lower.split(['?', '#']).next().unwrap_or("");
        if lower.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if lower.ends_with(".7z") || lower.ends_with(".dat") {
            Some(ArchiveKind::SevenZip)
        } else {
            None
        }
    }
}

/// Strategy used to materialize content into a game workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WorkspaceStrategy {
    #[default]
    HybridCopySymlink,
    FullCopy,
    SymlinkOnly,
    HardLink,
}

/// How a dependency is satisfied at install time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DependencyInstallBehavior {
    #[default]
    RequireExisting,
    AutoInstall,
    Optional,
    Suggest,
}

/// Ordering applied to aggregated search results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ContentSortOrder {
    /// Keep the order providers returned
    #[default]
    Relevance,
    Name,
    DateUpdated,
    DownloadCount,
    Rating,
}
