//! Content catalog parsing with multi-mirror entries

pub mod mirrors;
pub mod parser;
pub mod registry;

pub use mirrors::{rank_mirrors, select_preferred_mirror, CatalogMirror};
pub use parser::{metadata_keys, parse_catalog_document, Catalog, CatalogItem, CatalogParser};
pub use registry::{lookup as lookup_content_code, ContentCategory, ContentCodeInfo};
