//! Host adapter: the network side of FlowLens.
//!
//! The core never performs I/O itself. This crate supplies what it consumes:
//! - [`FrameFetcher`]: hosting document and embedded frame markup
//! - [`HttpTranscriptFetcher`]: a [`TranscriptFetcher`](flowlens_core::TranscriptFetcher)
//!   over HTTP
//! - [`is_ssrf_target`]: guard for URLs lifted out of fetched markup

pub mod frames;
pub mod guard;
pub mod transcript;

pub use frames::FrameFetcher;
pub use guard::is_ssrf_target;
pub use transcript::HttpTranscriptFetcher;
