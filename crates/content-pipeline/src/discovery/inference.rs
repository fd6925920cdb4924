//! Ordered inference of content type and target game
//!
//! Each strategy either answers or abstains; the first answer wins. Content
//! type and target game are decided independently, so topics can settle the
//! game while the name settles the type.

use crate::model::{ContentType, GameType};

/// What is known about an item before inference
#[derive(Debug, Clone, Copy, Default)]
pub struct InferenceInput<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub topics: &'a [String],
}

/// Partial answer from one strategy; `None` means no opinion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Inference {
    pub content_type: Option<ContentType>,
    pub target_game: Option<GameType>,
}

pub trait InferenceStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn infer(&self, input: &InferenceInput<'_>) -> Inference;
}

/// Reads repository topics
#[derive(Debug, Default, Clone, Copy)]
pub struct TopicInference;

impl InferenceStrategy for TopicInference {
    fn name(&self) -> &'static str {
        "topics"
    }

    fn infer(&self, input: &InferenceInput<'_>) -> Inference {
        let has = |wanted: &[&str]| {
            input
                .topics
                .iter()
                .any(|topic| wanted.iter().any(|w| topic.eq_ignore_ascii_case(w)))
        };

        let content_type = if has(&["game-client", "gameclient"]) {
            Some(ContentType::GameClient)
        } else if has(&["patch", "community-patch"]) {
            Some(ContentType::Patch)
        } else if has(&["mappack", "map-pack"]) {
            Some(ContentType::MapPack)
        } else if has(&["map", "maps"]) {
            Some(ContentType::Map)
        } else if has(&["addon", "hotkeys", "controlbar"]) {
            Some(ContentType::Addon)
        } else if has(&["modding-tool", "tool", "tools"]) {
            Some(ContentType::ModdingTool)
        } else if has(&["language-pack", "translation"]) {
            Some(ContentType::LanguagePack)
        } else if has(&["skin"]) {
            Some(ContentType::Skin)
        } else if has(&["mission", "campaign"]) {
            Some(ContentType::Mission)
        } else if has(&["mod", "generals-mod", "zero-hour-mod"]) {
            Some(ContentType::Mod)
        } else {
            None
        };

        let target_game = if has(&["zero-hour", "zerohour", "zero-hour-mod", "cnc-zero-hour"]) {
            Some(GameType::ZeroHour)
        } else if has(&["generals-mod", "cnc-generals-only"]) {
            Some(GameType::Generals)
        } else {
            None
        };

        Inference { content_type, target_game }
    }
}

/// Falls back to keywords in the name and description
#[derive(Debug, Default, Clone, Copy)]
pub struct NameInference;

impl InferenceStrategy for NameInference {
    fn name(&self) -> &'static str {
        "name"
    }

    fn infer(&self, input: &InferenceInput<'_>) -> Inference {
        let text = format!("{} {}", input.name, input.description).to_lowercase();
        let words: Vec<&str> = text
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let has_word = |w: &str| words.iter().any(|word| *word == w);

        let content_type = if text.contains("map pack") || text.contains("mappack") {
            Some(ContentType::MapPack)
        } else if has_word("patch") {
            Some(ContentType::Patch)
        } else if has_word("map") || has_word("maps") {
            Some(ContentType::Map)
        } else if text.contains("hotkey") || text.contains("control bar") || text.contains("controlbar") || has_word("addon") {
            Some(ContentType::Addon)
        } else if has_word("client") || has_word("executable") || has_word("launcher") {
            Some(ContentType::GameClient)
        } else if has_word("tool") || has_word("editor") || has_word("tools") {
            Some(ContentType::ModdingTool)
        } else if has_word("mod") {
            Some(ContentType::Mod)
        } else {
            None
        };

        let target_game = if text.contains("zero hour") || text.contains("zerohour") || has_word("zh") {
            Some(GameType::ZeroHour)
        } else if has_word("generals") || has_word("ccg") {
            Some(GameType::Generals)
        } else {
            None
        };

        Inference { content_type, target_game }
    }
}

/// Strategies evaluated in order
pub struct InferencePipeline {
    strategies: Vec<Box<dyn InferenceStrategy>>,
    fallback_type: ContentType,
    fallback_game: GameType,
}

impl std::fmt::Debug for InferencePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("InferencePipeline").field("strategies", &names).finish()
    }
}

impl Default for InferencePipeline {
    fn default() -> Self {
        Self::new()
            .with_strategy(TopicInference)
            .with_strategy(NameInference)
    }
}

impl InferencePipeline {
    /// Pipeline without strategies; everything falls back
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
            fallback_type: ContentType::Mod,
            fallback_game: GameType::ZeroHour,
        }
    }

    pub fn with_strategy<S: InferenceStrategy + 'static>(mut self, strategy: S) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn with_fallback(mut self, content_type: ContentType, game: GameType) -> Self {
        self.fallback_type = content_type;
        self.fallback_game = game;
        self
    }

    pub fn infer(&self, input: &InferenceInput<'_>) -> (ContentType, GameType) {
        let mut content_type = None;
        let mut target_game = None;

        for strategy in &self.strategies {
            if content_type.is_some() && target_game.is_some() {
                break;
            }
            let answer = strategy.infer(input);
            content_type = content_type.or(answer.content_type);
            target_game = target_game.or(answer.target_game);
        }

        (
            content_type.unwrap_or(self.fallback_type),
            target_game.unwrap_or(self.fallback_game),
        )
    }
}
