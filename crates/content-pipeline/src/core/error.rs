//! Error types for the content pipeline with context and recovery information

use std::error::Error;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by discoverers, resolvers, deliverers, factories and the orchestrator
#[derive(Error, Debug)]
pub enum ContentError {
    /// HTTP transport failure with the URL that was requested
    #[error("HTTP request to '{url}' failed")]
    HttpRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("HTTP request to '{url}' returned status {status}")]
    HttpStatus {
        url: String,
        status: u16,
    },

    /// Request timed out
    #[error("Request to '{url}' timed out after {duration_secs}s")]
    NetworkTimeout {
        url: String,
        duration_secs: u64,
    },

    /// File system I/O errors with file context
    #[error("File operation failed on '{path}' while {operation}")]
    FileSystem {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization errors
    #[error("Failed to process JSON for {context}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// URL parsing errors
    #[error("Invalid URL '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Malformed remote document (catalog, HTML page, API payload)
    #[error("Failed to parse {context}: {message}")]
    Parse {
        context: String,
        message: String,
    },

    /// Configuration errors, including missing provider components
    #[error("Invalid configuration: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
        suggestion: Option<String>,
    },

    /// Search query outside of accepted bounds
    #[error("Invalid search query: {message}")]
    InvalidQuery {
        message: String,
    },

    #[error("Content provider '{name}' is not registered")]
    ProviderNotFound {
        name: String,
    },

    #[error("No enabled content providers")]
    NoEnabledProviders,

    /// Manifest failed structural validation
    #[error("Manifest '{manifest_id}' is invalid: {}", issues.join("; "))]
    ManifestValidation {
        manifest_id: String,
        issues: Vec<String>,
    },

    /// Two files slated for the same relative path
    #[error("Manifest '{manifest_id}' contains duplicate file path '{path}'")]
    DuplicateFilePath {
        manifest_id: String,
        path: String,
    },

    #[error("Failed to extract '{archive}': {reason}")]
    Extraction {
        archive: PathBuf,
        reason: String,
    },

    /// Downloaded or staged file does not hash to the expected value
    #[error("Hash mismatch for '{path}': expected {expected}, got {actual}")]
    HashMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Every URL (primary and mirrors) failed
    #[error("Download failed after trying {attempted_urls} URL(s) for '{file}': {last_error}")]
    DownloadExhausted {
        file: String,
        attempted_urls: usize,
        last_error: String,
    },

    #[error("Failed to resolve '{content_id}': {reason}")]
    Resolution {
        content_id: String,
        reason: String,
    },

    #[error("Failed to deliver '{manifest_id}': {reason}")]
    Delivery {
        manifest_id: String,
        reason: String,
    },

    #[error("Failed to store '{manifest_id}' in the manifest pool: {reason}")]
    Storage {
        manifest_id: String,
        reason: String,
    },

    /// Operation cancelled through its cancellation token
    #[error("Operation cancelled: {operation}")]
    Cancelled {
        operation: String,
    },

    /// Every provider in a fan-out failed
    #[error("Search failed for all providers: {}", errors.join("; "))]
    SearchFailed {
        errors: Vec<String>,
    },
}

/// Types of file operations for error context
#[derive(Debug, Clone, PartialEq)]
pub enum FileOperation {
    Read,
    Write,
    Create,
    Delete,
    Copy,
    Metadata,
    CreateDir,
    Walk,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::Create => write!(f, "creating"),
            FileOperation::Delete => write!(f, "deleting"),
            FileOperation::Copy => write!(f, "copying"),
            FileOperation::Metadata => write!(f, "reading metadata"),
            FileOperation::CreateDir => write!(f, "creating directory"),
            FileOperation::Walk => write!(f, "walking directory"),
        }
    }
}

pub type Result<T> = std::result::Result<T, ContentError>;

impl ContentError {
    /// Build a file system error carrying the path and the operation
    pub fn file_system<P: Into<PathBuf>>(path: P, operation: FileOperation, source: std::io::Error) -> Self {
        ContentError::FileSystem {
            path: path.into(),
            operation,
            source,
        }
    }

    pub fn parse<C: Into<String>, M: Into<String>>(context: C, message: M) -> Self {
        ContentError::Parse {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn configuration<M: Into<String>>(message: M) -> Self {
        ContentError::Configuration {
            message: message.into(),
            field: None,
            suggestion: None,
        }
    }

    pub fn cancelled<S: Into<String>>(operation: S) -> Self {
        ContentError::Cancelled {
            operation: operation.into(),
        }
    }

    /// Check if error is recoverable (worth retrying)
    pub fn is_recoverable(&self) -> bool {
        match self {
            ContentError::HttpRequest { source, .. } => {
                // Client errors (4xx) won't get better on retry
                source.status().map_or(true, |status| status.is_server_error() || status == 429)
            }
            ContentError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            ContentError::NetworkTimeout { .. } => true,
            ContentError::FileSystem { source, .. } => {
                matches!(source.kind(),
                    std::io::ErrorKind::Interrupted |
                    std::io::ErrorKind::TimedOut |
                    std::io::ErrorKind::WouldBlock
                )
            }
            ContentError::DownloadExhausted { .. } => false,
            _ => false,
        }
    }

    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            ContentError::HttpRequest { .. } => "http_request",
            ContentError::HttpStatus { .. } => "http_status",
            ContentError::NetworkTimeout { .. } => "network_timeout",
            ContentError::FileSystem { .. } => "file_system",
            ContentError::Json { .. } => "json",
            ContentError::InvalidUrl { .. } => "invalid_url",
            ContentError::Parse { .. } => "parse",
            ContentError::Configuration { .. } => "configuration",
            ContentError::InvalidQuery { .. } => "invalid_query",
            ContentError::ProviderNotFound { .. } => "provider_not_found",
            ContentError::NoEnabledProviders => "no_enabled_providers",
            ContentError::ManifestValidation { .. } => "manifest_validation",
            ContentError::DuplicateFilePath { .. } => "duplicate_file_path",
            ContentError::Extraction { .. } => "extraction",
            ContentError::HashMismatch { .. } => "hash_mismatch",
            ContentError::DownloadExhausted { .. } => "download_exhausted",
            ContentError::Resolution { .. } => "resolution",
            ContentError::Delivery { .. } => "delivery",
            ContentError::Storage { .. } => "storage",
            ContentError::Cancelled { .. } => "cancelled",
            ContentError::SearchFailed { .. } => "search_failed",
        }
    }

    /// Get severity level for error prioritization
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ContentError::Cancelled { .. } => ErrorSeverity::Low,
            ContentError::HttpRequest { .. }
            | ContentError::HttpStatus { .. }
            | ContentError::NetworkTimeout { .. }
            | ContentError::Parse { .. }
            | ContentError::InvalidQuery { .. }
            | ContentError::Resolution { .. } => ErrorSeverity::Medium,
            ContentError::Configuration { .. } | ContentError::Storage { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// Get user-facing suggestion for resolving the error
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            ContentError::NetworkTimeout { .. } => {
                Some("Check your internet connection or try increasing the timeout value")
            }
            ContentError::Configuration { suggestion, .. } => suggestion.as_deref(),
            ContentError::NoEnabledProviders => Some("Enable at least one content provider"),
            ContentError::HashMismatch { .. } => Some("Delete the file and download it again"),
            ContentError::DuplicateFilePath { .. } => {
                Some("The content publisher shipped conflicting files; report it to the publisher")
            }
            ContentError::InvalidQuery { .. } => Some("Use a page size between 1 and 1000"),
            _ => None,
        }
    }

    /// Create a detailed error report for debugging
    pub fn detailed_report(&self) -> String {
        let mut report = format!("Error: {}\n", self);
        report.push_str(&format!("Category: {}\n", self.category()));
        report.push_str(&format!("Severity: {:?}\n", self.severity()));
        report.push_str(&format!("Recoverable: {}\n", self.is_recoverable()));

        if let Some(suggestion) = self.suggestion() {
            report.push_str(&format!("Suggestion: {}\n", suggestion));
        }

        if let Some(source) = self.source() {
            report.push_str(&format!("Root cause: {}\n", source));
        }

        report
    }
}

/// Error severity levels for prioritization
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl From<reqwest::Error> for ContentError {
    fn from(error: reqwest::Error) -> Self {
        let url = error.url().map(|u| u.to_string()).unwrap_or_else(|| "<unknown>".to_string());

        if error.is_timeout() {
            ContentError::NetworkTimeout {
                url,
                duration_secs: 30,
            }
        } else {
            ContentError::HttpRequest {
                url,
                source: error,
            }
        }
    }
}

impl From<std::io::Error> for ContentError {
    fn from(error: std::io::Error) -> Self {
        ContentError::FileSystem {
            path: PathBuf::from("<unknown>"),
            operation: FileOperation::Read,
            source: error,
        }
    }
}

impl From<url::ParseError> for ContentError {
    fn from(error: url::ParseError) -> Self {
        ContentError::InvalidUrl {
            url: "<unparseable>".to_string(),
            source: error,
        }
    }
}

impl From<serde_json::Error> for ContentError {
    fn from(error: serde_json::Error) -> Self {
        ContentError::Json {
            context: "payload".to_string(),
            source: error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_recoverability() {
        let server_error = ContentError::HttpStatus { url: "https://x".into(), status: 503 };
        let not_found = ContentError::HttpStatus { url: "https://x".into(), status: 404 };
        let throttled = ContentError::HttpStatus { url: "https://x".into(), status: 429 };

        assert!(server_error.is_recoverable());
        assert!(!not_found.is_recoverable());
        assert!(throttled.is_recoverable());
    }

    #[test]
    fn test_detailed_report_includes_suggestion() {
        let error = ContentError::Configuration {
            message: "provider 'x' has no resolver".to_string(),
            field: Some("resolverId".to_string()),
            suggestion: Some("Register a resolver named 'x'".to_string()),
        };

        let report = error.detailed_report();
        assert!(report.contains("Category: configuration"));
        assert!(report.contains("Severity: Critical"));
        assert!(report.contains("Suggestion: Register a resolver named 'x'"));
    }

    #[test]
    fn test_aggregate_messages_are_joined() {
        let error = ContentError::SearchFailed {
            errors: vec!["a: down".to_string(), "b: timeout".to_string()],
        };
        assert_eq!(error.to_string(), "Search failed for all providers: a: down; b: timeout");
    }
}
