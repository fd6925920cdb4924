//! Content discoverers: find candidate content in one kind of source
//!
//! Discoverers look up their provider definition on every call, so a
//! provider removed from configuration fails its own searches without
//! affecting anyone else.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::{ContentError, ProviderDefinition, ProviderDefinitionLoader, Result};
use crate::model::{ContentSearchQuery, DiscoveryPage};

pub mod catalog;
pub mod filesystem;
pub mod github;
pub mod inference;
pub mod scrape;

pub use catalog::CommunityOutpostDiscoverer;
pub use filesystem::FileSystemDiscoverer;
pub use github::{GitHubTopicDiscoverer, DEFAULT_TOPICS, PRIMARY_TOPIC};
pub use inference::{Inference, InferenceInput, InferencePipeline, InferenceStrategy, NameInference, TopicInference};
pub use scrape::{ScrapeDiscoverer, ScrapeLayout, DETAIL_URL_KEY};

/// Produces lightweight search results from one source
#[async_trait]
pub trait ContentDiscoverer: Send + Sync {
    /// Identifier matched against `ProviderDefinition::discoverer_id`
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    async fn discover(&self, query: &ContentSearchQuery, cancel: &CancellationToken) -> Result<DiscoveryPage>;
}

/// Look up a provider definition, failing the current operation when it is missing
pub(crate) fn require_definition(
    loader: &dyn ProviderDefinitionLoader,
    provider_id: &str,
) -> Result<ProviderDefinition> {
    loader.get_provider(provider_id).ok_or_else(|| ContentError::Configuration {
        message: format!("no provider definition for '{}'", provider_id),
        field: Some("providerId".to_string()),
        suggestion: Some(format!("Add a {}{} file", provider_id, crate::core::PROVIDER_FILE_SUFFIX)),
    })
}
