//! Application configuration for FlowLens.
//!
//! User config lives at `~/.flowlens/flowlens.toml`.
//! CLI flags override config file values, which override defaults.
//!
//! The heuristic thresholds are empirically tuned. They are exposed as named
//! constants and every one of them can be overridden from the config file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FlowLensError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "flowlens.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".flowlens";

// ---------------------------------------------------------------------------
// Heuristic constants
// ---------------------------------------------------------------------------

/// Node name found in the annotation title or content.
pub const NAME_IN_ANNOTATION_CONFIDENCE: f64 = 0.9;
/// Node display title found in the annotation title or content.
pub const TITLE_IN_ANNOTATION_CONFIDENCE: f64 = 0.8;
/// Annotation title found inside the node name or display title.
pub const ANNOTATION_TITLE_IN_NODE_CONFIDENCE: f64 = 0.7;

/// Proximity is only tried while the best confidence is below this.
pub const PROXIMITY_CEILING: f64 = 0.7;
/// Fuzzy overlap is only tried while the best confidence is below this.
pub const FUZZY_CEILING: f64 = 0.5;
/// A match must be strictly above this to be accepted.
pub const MIN_MATCH_CONFIDENCE: f64 = 0.3;

pub const NEAR_DISTANCE_PX: f64 = 50.0;
pub const MID_DISTANCE_PX: f64 = 100.0;
pub const FAR_DISTANCE_PX: f64 = 200.0;
pub const NEAR_CONFIDENCE: f64 = 0.8;
pub const MID_CONFIDENCE: f64 = 0.6;
pub const FAR_CONFIDENCE: f64 = 0.4;

/// Maximum characters of surrounding text kept per video candidate.
pub const SURROUNDING_TEXT_LIMIT: usize = 200;

// ---------------------------------------------------------------------------
// Config structs (matching flowlens.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Node/annotation matcher thresholds.
    #[serde(default)]
    pub matcher: MatcherConfig,

    /// Video discovery and classification heuristics.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Transcript acquisition policy.
    #[serde(default)]
    pub transcripts: TranscriptConfig,

    /// Host adapter HTTP settings.
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// `[matcher]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub name_confidence: f64,
    pub title_confidence: f64,
    pub reverse_title_confidence: f64,
    pub proximity_ceiling: f64,
    pub fuzzy_ceiling: f64,
    pub min_confidence: f64,
    pub near_px: f64,
    pub mid_px: f64,
    pub far_px: f64,
    pub near_confidence: f64,
    pub mid_confidence: f64,
    pub far_confidence: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            name_confidence: NAME_IN_ANNOTATION_CONFIDENCE,
            title_confidence: TITLE_IN_ANNOTATION_CONFIDENCE,
            reverse_title_confidence: ANNOTATION_TITLE_IN_NODE_CONFIDENCE,
            proximity_ceiling: PROXIMITY_CEILING,
            fuzzy_ceiling: FUZZY_CEILING,
            min_confidence: MIN_MATCH_CONFIDENCE,
            near_px: NEAR_DISTANCE_PX,
            mid_px: MID_DISTANCE_PX,
            far_px: FAR_DISTANCE_PX,
            near_confidence: NEAR_CONFIDENCE,
            mid_confidence: MID_CONFIDENCE,
            far_confidence: FAR_CONFIDENCE,
        }
    }
}

/// `[classifier]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Substrings of a frame's `src` or `title` that mark the workflow preview.
    pub preview_markers: Vec<String>,
    /// Substrings that mark the workflow preview in a frame's `title` only.
    pub preview_title_markers: Vec<String>,
    /// Keywords that make a main-content video the workflow's explainer.
    pub explainer_keywords: Vec<String>,
    /// Keywords that mark a video as a generic tutorial.
    pub tutorial_keywords: Vec<String>,
    pub preview_confidence: f64,
    pub preview_first_confidence: f64,
    pub embed_confidence: f64,
    pub embed_first_confidence: f64,
    pub keyword_confidence: f64,
    pub related_confidence: f64,
    pub tutorial_confidence: f64,
    pub preview_fallback_confidence: f64,
    pub other_confidence: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            preview_markers: strings(&[
                "n8n-demo",
                "workflow-preview",
                "/workflows/demo",
                "n8n.io/workflows",
            ]),
            preview_title_markers: strings(&["workflow"]),
            explainer_keywords: strings(&[
                "workflow",
                "tutorial",
                "how to",
                "guide",
                "video tutorial",
            ]),
            tutorial_keywords: strings(&["tutorial", "learn"]),
            preview_confidence: 0.95,
            preview_first_confidence: 0.98,
            embed_confidence: 0.9,
            embed_first_confidence: 0.95,
            keyword_confidence: 0.8,
            related_confidence: 0.8,
            tutorial_confidence: 0.7,
            preview_fallback_confidence: 0.75,
            other_confidence: 0.5,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// `[transcripts]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Attempts per video, including the first.
    pub max_attempts: u32,
    /// First backoff delay; doubles after every transient failure.
    pub base_delay_ms: u64,
    /// Videos fetched in parallel for one page.
    pub concurrency: usize,
    /// Base URL of the transcript service used by the HTTP fetcher.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Request timeout for the HTTP fetcher.
    pub timeout_secs: u64,
    /// Name of the env var holding the transcript service key (never the key itself).
    pub api_key_env: String,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            concurrency: 4,
            endpoint: None,
            timeout_secs: 20,
            api_key_env: "FLOWLENS_TRANSCRIPT_KEY".into(),
        }
    }
}

impl TranscriptConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// The transcript service key from the configured env var, if set.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|v| !v.is_empty())
    }
}

/// `[fetch]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_redirects: 5,
        }
    }
}

impl AppConfig {
    /// Reject configurations the heuristics cannot work with.
    pub fn validate(&self) -> Result<()> {
        let m = &self.matcher;
        let confidences = [
            ("matcher.name_confidence", m.name_confidence),
            ("matcher.title_confidence", m.title_confidence),
            ("matcher.reverse_title_confidence", m.reverse_title_confidence),
            ("matcher.min_confidence", m.min_confidence),
            ("matcher.near_confidence", m.near_confidence),
            ("matcher.mid_confidence", m.mid_confidence),
            ("matcher.far_confidence", m.far_confidence),
        ];
        for (key, value) in confidences {
            if !(0.0..=1.0).contains(&value) {
                return Err(FlowLensError::config(format!(
                    "{key} must be within [0, 1], got {value}"
                )));
            }
        }

        if !(m.near_px < m.mid_px && m.mid_px < m.far_px) {
            return Err(FlowLensError::config(
                "matcher distances must satisfy near_px < mid_px < far_px",
            ));
        }

        if self.transcripts.max_attempts == 0 {
            return Err(FlowLensError::config("transcripts.max_attempts must be at least 1"));
        }
        if self.transcripts.concurrency == 0 {
            return Err(FlowLensError::config("transcripts.concurrency must be at least 1"));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.flowlens/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| FlowLensError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.flowlens/flowlens.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| FlowLensError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        FlowLensError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| FlowLensError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| FlowLensError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| FlowLensError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
