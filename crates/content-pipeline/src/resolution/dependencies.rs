//! Static dependency registry keyed by content type and catalog code

use crate::model::{ContentDependency, ContentType, DependencyInstallBehavior, GameType};

/// Catalog codes of mutually exclusive control bars
const CONTROL_BAR_CODES: [&str; 3] = ["cbbs", "cben", "cbpr"];

/// Dependency ids name a kind of content rather than one manifest
pub fn game_client_dependency_id(game: GameType) -> String {
    format!("{}.gameclient", game.slug())
}

fn game_client(game: GameType) -> ContentDependency {
    let (name, min_version) = match game {
        GameType::Generals => ("Command & Conquer: Generals", Some("1.08")),
        GameType::ZeroHour => ("Command & Conquer: Generals Zero Hour", Some("1.04")),
        GameType::Unknown => ("Game client", None),
    };

    ContentDependency {
        id: game_client_dependency_id(game),
        name: name.to_string(),
        dependency_type: ContentType::GameClient,
        install_behavior: DependencyInstallBehavior::RequireExisting,
        min_version: min_version.map(str::to_string),
        max_version: None,
        is_exclusive: false,
        conflicts_with: Vec::new(),
    }
}

/// Dependencies every manifest of `content_type` carries
pub fn dependencies_for(content_type: ContentType, game: GameType) -> Vec<ContentDependency> {
    match content_type {
        ContentType::GameClient | ContentType::ModdingTool | ContentType::Video | ContentType::Unknown => Vec::new(),
        ContentType::Mod => {
            let mut base = game_client(game);
            base.is_exclusive = true;
            vec![base]
        }
        ContentType::Patch | ContentType::LanguagePack => {
            let mut base = game_client(game);
            base.min_version = None;
            vec![base]
        }
        ContentType::Map | ContentType::MapPack | ContentType::Mission => {
            let mut base = game_client(game);
            base.install_behavior = DependencyInstallBehavior::Suggest;
            vec![base]
        }
        ContentType::Addon | ContentType::Skin => vec![game_client(game)],
    }
}

/// Codes that cannot be active together with `code`
pub fn conflicts_for_code(code: &str) -> Vec<String> {
    let code = code.to_ascii_lowercase();
    if CONTROL_BAR_CODES.contains(&code.as_str()) {
        return CONTROL_BAR_CODES
            .iter()
            .filter(|other| **other != code)
            .map(|other| other.to_string())
            .collect();
    }
    if let Some(language) = code.strip_prefix("hl") {
        return ["en", "de", "pl", "ru", "zh"]
            .iter()
            .filter(|other| **other != language)
            .map(|other| format!("hl{}", other))
            .collect();
    }
    Vec::new()
}
