//! # Metadata Module
//!
//! Best-effort tag and duration extraction for content headed to the
//! device, with deterministic filename fallbacks so resolution never
//! fails.
//!
//! - [`TagExtractor`](extractor::TagExtractor) - lofty-backed extraction from bytes
//! - [`MetadataResolver`](resolver::MetadataResolver) - extraction + fallback, infallible
//! - [`fallback`] - dash-split filename heuristics and fixed defaults

pub mod error;
pub mod extractor;
pub mod fallback;
pub mod resolver;

pub use error::{MetadataError, Result};
pub use extractor::{content_hash, ExtractedTags, TagExtractor};
pub use resolver::{MetadataResolver, ResolvedMetadata};
