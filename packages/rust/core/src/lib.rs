//! Correlation and classification engine for FlowLens.
//!
//! This crate turns the plain records produced by `flowlens-discovery` into an
//! [`ExtractionResult`](flowlens_shared::ExtractionResult):
//! - [`matcher`]: associates canvas nodes with annotation text
//! - [`classifier`]: explainer vs related/tutorial/other videos
//! - [`dedup`]: one entry per platform video
//! - [`transcript`]: retrying transcript acquisition around an injected fetcher
//! - [`quality`]: composite score
//! - [`pipeline`]: runs the phases in order for one page

pub mod classifier;
pub mod dedup;
pub mod matcher;
pub mod pipeline;
pub mod quality;
pub mod transcript;

pub use classifier::classify;
pub use dedup::{Deduplicated, dedupe};
pub use matcher::match_nodes;
pub use pipeline::{
    PageAnalysis, ProgressReporter, SilentProgress, analyze_page, extract_page,
    extract_page_offline,
};
pub use quality::score;
pub use transcript::{FetchOutcome, RetryPolicy, TranscriptFetcher, TranscriptReport, acquire};
