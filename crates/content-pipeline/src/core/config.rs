//! Configuration types for the content pipeline

use std::path::PathBuf;
use std::time::Duration;

use crate::core::{ContentError, Result};

/// Runtime configuration shared by every pipeline component
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Timeout applied to every HTTP request
    pub http_timeout: Duration,
    pub user_agent: String,
    /// Attempts per URL before moving on to the next mirror
    pub download_retries: usize,
    /// Initial delay between download retries (doubles each retry)
    pub retry_delay: Duration,
    pub search_cache_ttl: Duration,
    pub manifest_cache_ttl: Duration,
    /// Parent of the per-acquisition staging directories
    pub staging_root: PathBuf,
    /// Maximum number of files hashed concurrently during validation
    pub max_concurrent_validations: usize,
    /// Pause after each release lookup against the GitHub API
    pub github_request_delay: Duration,
    pub default_page_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(30),
            user_agent: format!("content-pipeline/{}", env!("CARGO_PKG_VERSION")),
            download_retries: 3,
            retry_delay: Duration::from_millis(500),
            search_cache_ttl: Duration::from_secs(5 * 60),
            manifest_cache_ttl: Duration::from_secs(60 * 60),
            staging_root: std::env::temp_dir().join("content-pipeline").join("staging"),
            max_concurrent_validations: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            github_request_delay: Duration::from_millis(250),
            default_page_size: 50,
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Check values that would make the pipeline misbehave
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_validations == 0 {
            return Err(ContentError::Configuration {
                message: "max_concurrent_validations must be at least 1".to_string(),
                field: Some("max_concurrent_validations".to_string()),
                suggestion: Some("Leave it unset to use the available processor count".to_string()),
            });
        }
        if self.default_page_size == 0 || self.default_page_size > crate::model::MAX_TAKE {
            return Err(ContentError::Configuration {
                message: format!("default_page_size must be between 1 and {}", crate::model::MAX_TAKE),
                field: Some("default_page_size".to_string()),
                suggestion: None,
            });
        }
        if self.user_agent.trim().is_empty() {
            return Err(ContentError::Configuration {
                message: "user_agent must not be empty".to_string(),
                field: Some("user_agent".to_string()),
                suggestion: Some("GitHub rejects requests without a user agent".to_string()),
            });
        }
        Ok(())
    }
}

/// Builder for [`PipelineConfig`]
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.config.http_timeout = timeout;
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn download_retries(mut self, retries: usize) -> Self {
        self.config.download_retries = retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    pub fn search_cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.search_cache_ttl = ttl;
        self
    }

    pub fn manifest_cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.manifest_cache_ttl = ttl;
        self
    }

    pub fn staging_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.config.staging_root = root.into();
        self
    }

    pub fn max_concurrent_validations(mut self, max: usize) -> Self {
        self.config.max_concurrent_validations = max;
        self
    }

    pub fn github_request_delay(mut self, delay: Duration) -> Self {
        self.config.github_request_delay = delay;
        self
    }

    pub fn default_page_size(mut self, size: usize) -> Self {
        self.config.default_page_size = size;
        self
    }

    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.search_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.manifest_cache_ttl, Duration::from_secs(3600));
        assert!(config.max_concurrent_validations >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_rejects_zero_validations() {
        let result = PipelineConfig::builder().max_concurrent_validations(0).build();
        assert!(matches!(result, Err(ContentError::Configuration { field: Some(f), .. }) if f == "max_concurrent_validations"));
    }
}
