//! Candidate extraction: raw markup and workflow JSON → plain records.
//!
//! Everything here is a pure function over already-fetched text. The host
//! supplies the hosting document, each embedded frame's markup (raw fetched
//! text for cross-origin frames), and optionally the workflow definition.
//!
//! - [`workflow`]: workflow JSON → [`Node`](flowlens_shared::Node)s and
//!   [`Annotation`](flowlens_shared::Annotation)s
//! - [`video`]: video reference detection within one markup context
//! - [`page`]: frame listing, preview detection, content signals

mod context;
pub mod page;
pub mod video;
pub mod workflow;

use tracing::{info, instrument, warn};

use flowlens_shared::{
    ClassifierConfig, ContextTier, ExtractionIssue, FlowLensError, FrameOrigin, PageInput,
    VideoCandidate,
};

pub use page::{FrameRef, is_preview_frame, list_frames, page_signals};
pub use video::{ScanScope, SweepHit, parse_video_url, scan_context, sweep};
pub use workflow::{WorkflowCanvas, find_workflow_json, load_canvas, parse_workflow};

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Outcome of scanning every context of one page.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Candidates in scan order: host document first, then frames in the
    /// order the host supplied them.
    pub candidates: Vec<VideoCandidate>,
    /// Degraded conditions (unreachable frames).
    pub issues: Vec<ExtractionIssue>,
}

/// Discover every video reference across the page's three context tiers.
///
/// A frame whose fetch failed, or a cross-origin frame whose markup the host
/// did not supply, is reported as a partial discovery failure; scanning
/// continues with the other contexts.
#[instrument(skip_all, fields(page = input.page_url.as_deref().unwrap_or("<unknown>")))]
pub fn discover(input: &PageInput, config: &ClassifierConfig) -> Discovery {
    let mut discovery = Discovery::default();

    discovery.candidates.extend(scan_context(
        &input.host_markup,
        ScanScope {
            tier: ContextTier::HostDocument,
            container_src: None,
            container_title: None,
            in_workflow_preview: false,
        },
    ));

    for frame in &input.frames {
        let tier = match frame.origin {
            FrameOrigin::SameContext => ContextTier::EmbeddedFrame,
            FrameOrigin::CrossOrigin => ContextTier::CrossOriginFrame,
        };

        let markup = frame.markup.as_deref();
        if frame.fetch_error.is_some()
            || (markup.is_none() && frame.origin == FrameOrigin::CrossOrigin)
        {
            let err = FlowLensError::PartialDiscoveryFailure {
                frame: frame.label(),
                message: frame
                    .fetch_error
                    .clone()
                    .unwrap_or_else(|| "markup not supplied".into()),
            };
            warn!(error = %err, "continuing without frame");
            discovery.issues.push(err.to_issue());
        }
        let Some(markup) = markup else {
            continue;
        };

        let scope = ScanScope {
            tier,
            container_src: frame.src.as_deref(),
            container_title: frame.title.as_deref(),
            in_workflow_preview: is_preview_frame(frame, config),
        };
        discovery.candidates.extend(scan_context(markup, scope));
    }

    info!(
        candidates = discovery.candidates.len(),
        frames = input.frames.len(),
        issues = discovery.issues.len(),
        "video discovery complete"
    );

    discovery
}
