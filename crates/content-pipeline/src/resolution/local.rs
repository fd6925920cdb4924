//! Resolver for results that already carry their manifest

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::{ContentError, Result};
use crate::discovery::filesystem::LOCAL_RESOLVER_ID;
use crate::model::{ContentManifest, ContentSearchResult};
use crate::resolution::ContentResolver;

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalManifestResolver;

impl LocalManifestResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContentResolver for LocalManifestResolver {
    fn resolver_id(&self) -> &str {
        LOCAL_RESOLVER_ID
    }

    async fn resolve(&self, item: &ContentSearchResult, _cancel: &CancellationToken) -> Result<ContentManifest> {
        item.data.manifest().cloned().ok_or_else(|| ContentError::Resolution {
            content_id: item.id.clone(),
            reason: "result carries no embedded manifest".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentManifestBuilder, SearchPayload};

    #[tokio::test]
    async fn test_returns_embedded_manifest() {
        let manifest = ContentManifestBuilder::new().with_basic_info("Local", "1").build().unwrap();
        let mut item = ContentSearchResult::new(manifest.id.clone(), "Local", "local");
        let cancel = CancellationToken::new();

        assert!(LocalManifestResolver::new().resolve(&item, &cancel).await.is_err());
        item.data = SearchPayload::Manifest(Box::new(manifest.clone()));
        assert_eq!(LocalManifestResolver::new().resolve(&item, &cancel).await.unwrap(), manifest);
    }
}
