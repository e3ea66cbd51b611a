//! Canvas, page-input and result types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::video::ClassifiedVideo;

// ---------------------------------------------------------------------------
// Canvas entities
// ---------------------------------------------------------------------------

/// A point on the workflow canvas.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// One executable step on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    /// Canvas position from the workflow definition, treated as the node center.
    pub position: Point,
}

impl Node {
    /// Human title derived from the node type.
    ///
    /// `n8n-nodes-base.sendEmail` becomes `Send Email`.
    pub fn display_title(&self) -> String {
        let last = self
            .node_type
            .rsplit(['.', '/'])
            .next()
            .unwrap_or(&self.node_type);

        let mut words: Vec<String> = Vec::new();
        let mut current = String::new();
        for c in last.chars() {
            if c == '-' || c == '_' || c.is_whitespace() {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
                continue;
            }
            if c.is_uppercase() && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            current.push(c);
        }
        if !current.is_empty() {
            words.push(current);
        }

        words
            .iter()
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Position and optional size of an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AnnotationBox {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl AnnotationBox {
    /// Box center when the size is known, otherwise the anchor point.
    pub fn center(&self) -> Point {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0.0 && h > 0.0 => {
                Point::new(self.x + w / 2.0, self.y + h / 2.0)
            }
            _ => Point::new(self.x, self.y),
        }
    }
}

/// A free-floating author note on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    pub title: String,
    pub content: String,
    pub position: AnnotationBox,
}

/// How a node's context was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    NameExact,
    Proximity,
    Fuzzy,
    None,
}

/// One node paired with at most one annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeContext {
    pub node_id: String,
    pub node_name: String,
    pub node_type: String,
    pub node_position: Point,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_content: Option<String>,
    pub match_confidence: f64,
    pub extraction_method: ExtractionMethod,
}

// ---------------------------------------------------------------------------
// Host input
// ---------------------------------------------------------------------------

/// Whether a frame's markup is directly readable from the hosting document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameOrigin {
    SameContext,
    CrossOrigin,
}

/// An embedded frame as supplied by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub origin: FrameOrigin,
    /// Readable markup, or raw text fetched out-of-band for cross-origin frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markup: Option<String>,
    /// Why the host could not obtain `markup`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<String>,
}

impl FrameInput {
    /// A short label for logs and issue messages.
    pub fn label(&self) -> String {
        self.src
            .clone()
            .or_else(|| self.title.clone())
            .unwrap_or_else(|| "<anonymous frame>".into())
    }
}

/// Raw content signals used by the quality scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageSignals {
    /// Visible text length in characters.
    pub text_length: usize,
    pub image_count: usize,
    pub link_count: usize,
}

/// Everything the host hands the core for one page visit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    pub host_markup: String,
    #[serde(default)]
    pub frames: Vec<FrameInput>,
    /// The authoritative workflow definition. When absent it is looked up
    /// inside `host_markup` and the frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_json: Option<String>,
    /// Host-measured signals; derived from `host_markup` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signals: Option<PageSignals>,
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Category of a non-fatal (or, for `SurfaceNotFound`/`Internal`, fatal) issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    SurfaceNotFound,
    PartialDiscoveryFailure,
    TranscriptUnavailable,
    TranscriptTransientError,
    Internal,
}

/// One entry of [`ExtractionResult::errors`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionIssue {
    pub kind: IssueKind,
    pub message: String,
}

/// Duplicate-removal counters for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DedupStats {
    pub raw: usize,
    pub unique: usize,
    pub removed: usize,
}

/// The immutable outcome of one extraction call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub run_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    pub extracted_at: DateTime<Utc>,
    pub success: bool,
    pub node_contexts: Vec<NodeContext>,
    pub videos: Vec<ClassifiedVideo>,
    /// Canonical video URL → transcript text.
    pub transcripts: BTreeMap<String, String>,
    pub quality_score: u8,
    #[serde(default)]
    pub dedup_stats: DedupStats,
    #[serde(default)]
    pub page_signals: PageSignals,
    pub errors: Vec<ExtractionIssue>,
}

impl ExtractionResult {
    /// A `success=false` result carrying no partial data.
    pub fn failed(page_url: Option<String>, issue: ExtractionIssue) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            page_url,
            extracted_at: Utc::now(),
            success: false,
            node_contexts: Vec::new(),
            videos: Vec::new(),
            transcripts: BTreeMap::new(),
            quality_score: 0,
            dedup_stats: DedupStats::default(),
            page_signals: PageSignals::default(),
            errors: vec![issue],
        }
    }
}
