//! Collaborator services consumed by the pipeline
//!
//! Each service is a trait so hosts can plug in their own storage, download
//! and hashing; the default implementations cover standalone use and tests.

pub mod download;
pub mod hash;
pub mod http;
pub mod manifests;
pub mod pool;

pub use download::{DownloadProgressCallback, DownloadService, HttpDownloadService};
pub use hash::{hash_file_blocking, xxhash64_hex, FileHashProvider, XxHashFileHashProvider};
pub use http::{classify_reqwest_error, fetch_json, with_cancellation, HttpFetcher, ReqwestFetcher, RequestHeaders};
pub use manifests::{read_manifest, DiscoveredManifest, JsonManifestDiscovery, ManifestDiscovery, MANIFEST_FILE_SUFFIX};
pub use pool::{ContentManifestPool, InMemoryManifestPool};
