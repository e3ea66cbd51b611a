//! Video reference types: validated platform IDs, discovered candidates, and
//! classified videos.

use serde::{Deserialize, Serialize};

use crate::error::{FlowLensError, Result};

// ---------------------------------------------------------------------------
// Platform + VideoRef
// ---------------------------------------------------------------------------

/// Video hosting platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Youtube,
    Vimeo,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Youtube => "youtube",
            Self::Vimeo => "vimeo",
        }
    }

    /// Whether `id` has the exact length and charset this platform uses.
    pub fn is_valid_id(&self, id: &str) -> bool {
        match self {
            Self::Youtube => {
                id.len() == 11
                    && id
                        .bytes()
                        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
            }
            Self::Vimeo => (6..=11).contains(&id.len()) && id.bytes().all(|b| b.is_ascii_digit()),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A platform video ID that has passed validation.
///
/// The only constructor is [`VideoRef::new`] (deserialisation goes through it
/// as well), so a malformed ID cannot reach classification or output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "VideoRefRepr", into = "VideoRefRepr")]
pub struct VideoRef {
    platform: Platform,
    id: String,
}

#[derive(Serialize, Deserialize)]
struct VideoRefRepr {
    platform: Platform,
    platform_id: String,
}

impl TryFrom<VideoRefRepr> for VideoRef {
    type Error = FlowLensError;

    fn try_from(repr: VideoRefRepr) -> Result<Self> {
        Self::new(repr.platform, repr.platform_id)
    }
}

impl From<VideoRef> for VideoRefRepr {
    fn from(video: VideoRef) -> Self {
        Self {
            platform: video.platform,
            platform_id: video.id,
        }
    }
}

impl VideoRef {
    /// Validate `id` against the platform's ID shape.
    pub fn new(platform: Platform, id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if !platform.is_valid_id(&id) {
            return Err(FlowLensError::validation(format!(
                "invalid {platform} video id: {id:?}"
            )));
        }
        Ok(Self { platform, id })
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Canonical watch URL, used as the transcript map key.
    pub fn canonical_url(&self) -> String {
        match self.platform {
            Platform::Youtube => format!("https://www.youtube.com/watch?v={}", self.id),
            Platform::Vimeo => format!("https://vimeo.com/{}", self.id),
        }
    }
}

impl std::fmt::Display for VideoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.platform, self.id)
    }
}

// ---------------------------------------------------------------------------
// Candidate context
// ---------------------------------------------------------------------------

/// How a candidate was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryType {
    /// An anchor linking to a video page.
    VideoLink,
    /// An inline embed element (iframe, embed, lite-youtube, ...).
    HtmlEmbed,
    /// A regular-expression hit in raw markup.
    RegexDiscovered,
}

/// Which markup context a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextTier {
    HostDocument,
    EmbeddedFrame,
    CrossOriginFrame,
}

impl ContextTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HostDocument => "host_document",
            Self::EmbeddedFrame => "embedded_frame",
            Self::CrossOriginFrame => "cross_origin_frame",
        }
    }
}

/// Coarse page region inferred from ancestor container names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PagePosition {
    MainContent,
    Sidebar,
    Footer,
}

/// Where on the page a candidate was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateContext {
    pub tier: ContextTier,
    /// Coarse location tag, e.g. `host_document` or
    /// `host_document/related-workflows`.
    pub location: String,
    /// Up to 200 characters of nearby visible text.
    pub surrounding_text: String,
    pub position: PagePosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_title: Option<String>,
    /// Found inside the workflow-preview embed.
    #[serde(default)]
    pub in_workflow_preview: bool,
}

/// One discovered video reference. Several candidates may share a [`VideoRef`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoCandidate {
    pub url: String,
    #[serde(flatten)]
    pub video: VideoRef,
    pub discovery_type: DiscoveryType,
    pub context: CandidateContext,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Semantic category assigned to a video candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    PrimaryExplainer,
    RelatedWorkflow,
    Tutorial,
    Other,
}

impl Classification {
    /// Merge priority used when the same video is found more than once.
    pub fn priority(&self) -> u8 {
        match self {
            Self::PrimaryExplainer => 4,
            Self::RelatedWorkflow => 3,
            Self::Tutorial => 2,
            Self::Other => 1,
        }
    }
}

/// A candidate plus its classification and transcript status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedVideo {
    #[serde(flatten)]
    pub candidate: VideoCandidate,
    pub classification: Classification,
    pub confidence: f64,
    /// `None` until transcript acquisition has run for this video.
    #[serde(default)]
    pub has_transcript: Option<bool>,
    #[serde(default)]
    pub transcript_attempts: u32,
}

impl ClassifiedVideo {
    pub fn video(&self) -> &VideoRef {
        &self.candidate.video
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn youtube_id_requires_exact_length() {
        assert!(VideoRef::new(Platform::Youtube, "dQw4w9WgXcQ").is_ok());
        assert!(VideoRef::new(Platform::Youtube, "dQw4w9WgXc").is_err());
        assert!(VideoRef::new(Platform::Youtube, "dQw4w9WgXcQQ").is_err());
        assert!(VideoRef::new(Platform::Youtube, "dQw4w9Wg?cQ").is_err());
    }

    #[test]
    fn vimeo_id_is_numeric() {
        assert!(VideoRef::new(Platform::Vimeo, "76979871").is_ok());
        assert!(VideoRef::new(Platform::Vimeo, "channels").is_err());
        assert!(VideoRef::new(Platform::Vimeo, "123").is_err());
    }

    #[test]
    fn canonical_urls() {
        let yt = VideoRef::new(Platform::Youtube, "dQw4w9WgXcQ").unwrap();
        assert_eq!(yt.canonical_url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        let vm = VideoRef::new(Platform::Vimeo, "76979871").unwrap();
        assert_eq!(vm.canonical_url(), "https://vimeo.com/76979871");
        assert_eq!(vm.to_string(), "vimeo:76979871");
    }

    #[test]
    fn deserialization_rejects_invalid_id() {
        let ok: VideoRef =
            serde_json::from_str(r#"{"platform":"youtube","platform_id":"dQw4w9WgXcQ"}"#)
                .expect("valid ref");
        assert_eq!(ok.id(), "dQw4w9WgXcQ");

        let bad = serde_json::from_str::<VideoRef>(
            r#"{"platform":"youtube","platform_id":"0123456789"}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn priority_ordering() {
        assert!(Classification::PrimaryExplainer.priority() > Classification::RelatedWorkflow.priority());
        assert!(Classification::RelatedWorkflow.priority() > Classification::Tutorial.priority());
        assert!(Classification::Tutorial.priority() > Classification::Other.priority());
    }
}
