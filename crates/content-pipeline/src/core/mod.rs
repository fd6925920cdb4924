//! Core types used throughout the content pipeline
//!
//! Errors, progress reporting and configuration sit here so every other
//! module depends on them and never on each other for these concerns.

pub mod config;
pub mod error;
pub mod progress;
pub mod provider_definition;

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error::{ContentError, ErrorSeverity, FileOperation, Result};
pub use progress::{
    monotonic, report, AcquisitionPhase, AcquisitionProgress, CompositeProgressReporter, IntoProgressCallback,
    NullProgressReporter, ProgressCallback, ProgressReporter, TracingProgressReporter,
};
pub use provider_definition::{
    CatalogPolicy, JsonProviderDefinitionLoader, ProviderDefinition, ProviderDefinitionLoader, ProviderEndpoints,
    ProviderTimeouts, PROVIDER_FILE_SUFFIX,
};
