//! # Annex Guard Core
//!
//! Matching pipeline for cosmetic ingredient lists: text normalization,
//! the reference index built from the Annex II dataset, the exact/fuzzy
//! matcher with safe overrides, the single-flight result cache, and the
//! asynchronous analysis job lifecycle.
//!
//! This crate performs no filesystem or network I/O. Dataset loading,
//! configuration, and transport live in the `annex-guard` app crate.
//!
//! ## Data Flow
//!
//! ```text
//! raw text ─▶ split_ingredients ─▶ normalize ─▶ ResultCache ─▶ Matcher ─▶ ListSummary
//!                                                  │
//!                                            CacheStore (memory)
//! ```

pub mod cache;
pub mod error;
pub mod index;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod similarity;
pub mod split;
pub mod store;

pub use error::{AnalysisError, DatasetIntegrityError};
pub use index::{DatasetSnapshot, ReferenceIndex, SafeOverrideSet};
pub use matcher::{Classify, Matcher, Thresholds};
pub use models::{
    AnalysisJob, DatasetVersion, JobStatus, ListSummary, MatchStatus, MatchVerdict, Origin,
    ReferenceEntry,
};
pub use normalize::normalize;
pub use pipeline::AnalysisPipeline;
