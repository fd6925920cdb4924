//! Content resolvers: expand one discovered result into a full manifest
//!
//! Every resolution starts from a fresh [`crate::model::ContentManifestBuilder`].

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::core::Result;
use crate::model::{ContentManifest, ContentSearchResult};

pub mod dependencies;
pub mod genpatcher;
pub mod github;
pub mod local;
pub mod scrape;

pub use dependencies::{conflicts_for_code, dependencies_for, game_client_dependency_id};
pub use genpatcher::GenPatcherResolver;
pub use github::GitHubReleaseResolver;
pub use local::LocalManifestResolver;
pub use scrape::ScrapeResolver;

#[async_trait]
pub trait ContentResolver: Send + Sync {
    /// Identifier matched against `ContentSearchResult::resolver_id`
    fn resolver_id(&self) -> &str;

    async fn resolve(&self, item: &ContentSearchResult, cancel: &CancellationToken) -> Result<ContentManifest>;
}

/// Resolvers keyed by id; the first registration of an id wins
#[derive(Default, Clone)]
pub struct ResolverRegistry {
    resolvers: Vec<Arc<dyn ContentResolver>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false and keeps the existing resolver when the id is taken
    pub fn register(&mut self, resolver: Arc<dyn ContentResolver>) -> bool {
        if self.get(resolver.resolver_id()).is_some() {
            warn!("Resolver '{}' is already registered, ignoring duplicate", resolver.resolver_id());
            return false;
        }
        self.resolvers.push(resolver);
        true
    }

    pub fn get(&self, resolver_id: &str) -> Option<Arc<dyn ContentResolver>> {
        self.resolvers
            .iter()
            .find(|r| r.resolver_id().eq_ignore_ascii_case(resolver_id))
            .cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.resolvers.iter().map(|r| r.resolver_id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

/// File name at the end of a download URL, without query or fragment
pub(crate) fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let name = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = percent_encoding::percent_decode_str(name).decode_utf8_lossy();
    (!decoded.is_empty()).then(|| decoded.into_owned())
}
