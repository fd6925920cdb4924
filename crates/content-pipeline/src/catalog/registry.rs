//! Static metadata for catalog content codes

use crate::model::{ContentType, GameType};

/// Broad grouping of a catalog code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCategory {
    GameClient,
    OfficialPatch,
    Tool,
    ControlBar,
    Hotkeys,
    Maps,
    Runtime,
    Unknown,
}

/// What a four character content code stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentCodeInfo {
    pub code: String,
    /// Deterministic content name used in manifest ids
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub content_type: ContentType,
    pub target_game: GameType,
    pub category: ContentCategory,
    pub language: Option<&'static str>,
}

/// Language of localized patch variants, keyed by the code's last letter
pub fn language_for_suffix(suffix: char) -> Option<&'static str> {
    match suffix.to_ascii_lowercase() {
        'b' => Some("brazilian"),
        'c' => Some("chinese"),
        'd' => Some("german"),
        'e' => Some("english"),
        'f' => Some("french"),
        'i' => Some("italian"),
        'k' => Some("korean"),
        'p' => Some("polish"),
        's' => Some("spanish"),
        _ => None,
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn info(
    code: &str,
    name: &str,
    display_name: &str,
    description: &str,
    content_type: ContentType,
    target_game: GameType,
    category: ContentCategory,
) -> ContentCodeInfo {
    ContentCodeInfo {
        code: code.to_string(),
        name: name.to_string(),
        display_name: display_name.to_string(),
        description: description.to_string(),
        content_type,
        target_game,
        category,
        language: None,
    }
}

/// Look up a content code; unknown codes come back with `ContentType::Unknown`
pub fn lookup(code: &str) -> ContentCodeInfo {
    let code = code.to_ascii_lowercase();
    use ContentCategory as C;

    match code.as_str() {
        "10gn" => info(&code, "generals", "Generals 1.08", "Generals game client files", ContentType::GameClient, GameType::Generals, C::GameClient),
        "10zh" => info(&code, "zerohour", "Zero Hour 1.04", "Zero Hour game client files", ContentType::GameClient, GameType::ZeroHour, C::GameClient),
        "gent" => info(&code, "gentool", "GenTool", "Replay, observer and anti-cheat tool", ContentType::Addon, GameType::ZeroHour, C::Tool),
        "cbbs" => info(&code, "controlbarbasic", "Control Bar Basic", "Basic HD control bar", ContentType::Addon, GameType::ZeroHour, C::ControlBar),
        "cben" => info(&code, "controlbarenhanced", "Control Bar Enhanced", "Enhanced HD control bar", ContentType::Addon, GameType::ZeroHour, C::ControlBar),
        "cbpr" => info(&code, "controlbarpro", "Control Bar Pro", "Pro HD control bar", ContentType::Addon, GameType::ZeroHour, C::ControlBar),
        "mapp" => info(&code, "mappack", "Map Pack", "Community multiplayer map pack", ContentType::MapPack, GameType::ZeroHour, C::Maps),
        "drtx" | "vc05" | "vc08" => info(&code, &code, &code, "System runtime", ContentType::Unknown, GameType::Unknown, C::Runtime),
        _ => lookup_localized(&code),
    }
}

fn hotkey_language(code: &str) -> Option<&'static str> {
    match code.strip_prefix("hl")? {
        "en" => Some("english"),
        "de" => Some("german"),
        "pl" => Some("polish"),
        "ru" => Some("russian"),
        "zh" => Some("chinese"),
        _ => None,
    }
}

fn lookup_localized(code: &str) -> ContentCodeInfo {
    if let Some(language) = hotkey_language(code) {
        return ContentCodeInfo {
            code: code.to_string(),
            name: format!("hotkeys{}", language),
            display_name: format!("Leikeze Hotkeys ({})", capitalize(language)),
            description: format!("Improved hotkey layout, {} language", language),
            content_type: ContentType::Addon,
            target_game: GameType::ZeroHour,
            category: ContentCategory::Hotkeys,
            language: Some(language),
        };
    }

    let language = code.chars().nth(3).and_then(language_for_suffix);
    let patch = match code.get(..3) {
        Some("104") => Some(("104", GameType::ZeroHour)),
        Some("108") => Some(("108", GameType::Generals)),
        _ => None,
    };

    if let (Some(language), Some((patch, game)), 4) = (language, patch, code.len()) {
        let dotted = format!("{}.{}", &patch[..1], &patch[1..]);
        return ContentCodeInfo {
            code: code.to_string(),
            name: format!("patch{}{}", patch, language),
            display_name: format!("Official Patch {} ({})", dotted, capitalize(language)),
            description: format!("Official {} patch, {} language files", dotted, language),
            content_type: ContentType::Patch,
            target_game: game,
            category: ContentCategory::OfficialPatch,
            language: Some(language),
        };
    }

    info(code, code, code, "", ContentType::Unknown, GameType::Unknown, ContentCategory::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localized_patch_names() {
        let polish = lookup("104p");
        assert_eq!(polish.name, "patch104polish");
        assert_eq!(polish.content_type, ContentType::Patch);
        assert_eq!(polish.category, ContentCategory::OfficialPatch);
        assert_eq!(polish.target_game, GameType::ZeroHour);

        let generals = lookup("108E");
        assert_eq!(generals.name, "patch108english");
        assert_eq!(generals.target_game, GameType::Generals);
    }

    #[test]
    fn test_hotkeys_and_unknown_codes() {
        assert_eq!(lookup("hlde").name, "hotkeysgerman");
        assert_eq!(lookup("hlen").content_type, ContentType::Addon);
        assert_eq!(lookup("vc08").content_type, ContentType::Unknown);
        assert_eq!(lookup("zzzz").category, ContentCategory::Unknown);
        assert_eq!(lookup("104x").content_type, ContentType::Unknown);
    }
}
