//! Error types for FlowLens.
//!
//! Library crates use [`FlowLensError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Only [`FlowLensError::SurfaceNotFound`] aborts a page. The per-frame and
//! per-video variants are recorded on the result as [`ExtractionIssue`]s and
//! extraction carries on.

use std::path::PathBuf;

use crate::types::{ExtractionIssue, IssueKind};

/// Top-level error type for all FlowLens operations.
#[derive(Debug, thiserror::Error)]
pub enum FlowLensError {
    /// The canvas rendering surface (workflow definition) could not be located.
    #[error("workflow surface not found: {reason}")]
    SurfaceNotFound { reason: String },

    /// A cross-origin frame's markup was unreachable.
    #[error("frame {frame} unreachable: {message}")]
    PartialDiscoveryFailure { frame: String, message: String },

    /// The provider confirmed there is no transcript for this video.
    #[error("no transcript available for {video}: {message}")]
    TranscriptUnavailable { video: String, message: String },

    /// A transcript fetch failed in a way that may succeed on retry.
    #[error("transient transcript error for {video}: {message}")]
    TranscriptTransient { video: String, message: String },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error in a host adapter.
    #[error("network error: {0}")]
    Network(String),

    /// Markup or workflow JSON parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad video ID, bad input shape, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FlowLensError>;

impl FlowLensError {
    /// Create a surface-not-found error.
    pub fn surface_not_found(reason: impl Into<String>) -> Self {
        Self::SurfaceNotFound {
            reason: reason.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must abort the whole page's extraction.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SurfaceNotFound { .. })
    }

    /// The issue category this error is reported under.
    pub fn kind(&self) -> IssueKind {
        match self {
            Self::SurfaceNotFound { .. } => IssueKind::SurfaceNotFound,
            Self::PartialDiscoveryFailure { .. } => IssueKind::PartialDiscoveryFailure,
            Self::TranscriptUnavailable { .. } => IssueKind::TranscriptUnavailable,
            Self::TranscriptTransient { .. } => IssueKind::TranscriptTransientError,
            _ => IssueKind::Internal,
        }
    }

    /// Convert into the serialisable form stored on an extraction result.
    pub fn to_issue(&self) -> ExtractionIssue {
        ExtractionIssue {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = FlowLensError::config("bad threshold");
        assert_eq!(err.to_string(), "config error: bad threshold");

        let err = FlowLensError::surface_not_found("no workflow definition on page");
        assert!(err.to_string().contains("no workflow definition"));
    }

    #[test]
    fn only_surface_not_found_is_fatal() {
        assert!(FlowLensError::surface_not_found("x").is_fatal());
        assert!(
            !FlowLensError::PartialDiscoveryFailure {
                frame: "https://preview.example.com".into(),
                message: "timeout".into(),
            }
            .is_fatal()
        );
        assert!(!FlowLensError::parse("bad json").is_fatal());
    }

    #[test]
    fn issue_kind_mapping() {
        let err = FlowLensError::TranscriptTransient {
            video: "dQw4w9WgXcQ".into(),
            message: "timed out".into(),
        };
        let issue = err.to_issue();
        assert_eq!(issue.kind, IssueKind::TranscriptTransientError);
        assert!(issue.message.contains("dQw4w9WgXcQ"));

        assert_eq!(FlowLensError::Network("x".into()).kind(), IssueKind::Internal);
    }
}
