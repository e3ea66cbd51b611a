//! Shared types, error model, and configuration for FlowLens.
//!
//! This crate is the foundation depended on by all other FlowLens crates.
//! It provides:
//! - [`FlowLensError`]: the unified error type
//! - Canvas types ([`Node`], [`Annotation`], [`NodeContext`])
//! - Video types ([`VideoRef`], [`VideoCandidate`], [`ClassifiedVideo`])
//! - Host input and output ([`PageInput`], [`ExtractionResult`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;
pub mod video;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ClassifierConfig, FetchConfig, MatcherConfig, SURROUNDING_TEXT_LIMIT,
    TranscriptConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{FlowLensError, Result};
pub use types::{
    Annotation, AnnotationBox, DedupStats, ExtractionIssue, ExtractionMethod, ExtractionResult,
    FrameInput, FrameOrigin, IssueKind, Node, NodeContext, PageInput, PageSignals, Point,
};
pub use video::{
    CandidateContext, Classification, ClassifiedVideo, ContextTier, DiscoveryType, PagePosition,
    Platform, VideoCandidate, VideoRef,
};
