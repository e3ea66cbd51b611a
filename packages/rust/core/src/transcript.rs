//! Transcript acquisition with bounded retries.
//!
//! The network call is injected through [`TranscriptFetcher`]; this module only
//! owns the retry/backoff policy and the per-page fan-out.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use flowlens_shared::{
    ClassifiedVideo, ExtractionIssue, FlowLensError, TranscriptConfig, VideoRef,
};

/// Error fragments a provider uses when a video has no captions at all.
const TERMINAL_MARKERS: &[&str] = &["disabled", "no transcript", "not available", "unavailable"];

// ---------------------------------------------------------------------------
// Fetcher seam
// ---------------------------------------------------------------------------

/// Result of a single fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Transcript(String),
    /// Terminal: retrying will not help.
    Unavailable(String),
    /// Timeout or network failure; consumes a retry slot.
    Transient(String),
}

impl FetchOutcome {
    /// Map a host's `(success, text, error)` triple onto an outcome.
    pub fn from_parts(success: bool, text: Option<String>, error: Option<String>) -> Self {
        if success {
            return match text {
                Some(t) if !t.trim().is_empty() => Self::Transcript(t),
                _ => Self::Unavailable("empty transcript".into()),
            };
        }

        let message = error.unwrap_or_else(|| "unknown error".into());
        let lower = message.to_lowercase();
        if TERMINAL_MARKERS.iter().any(|m| lower.contains(m)) {
            Self::Unavailable(message)
        } else {
            Self::Transient(message)
        }
    }
}

/// Fetches the transcript of one video.
pub trait TranscriptFetcher: Send + Sync {
    fn fetch(&self, video: &VideoRef) -> impl Future<Output = FetchOutcome> + Send;
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&TranscriptConfig::default())
    }
}

impl From<&TranscriptConfig> for RetryPolicy {
    fn from(config: &TranscriptConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
        }
    }
}

impl RetryPolicy {
    /// Wait after the `attempt`-th transient failure (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(2u32.pow(exp))
    }
}

// ---------------------------------------------------------------------------
// Acquisition
// ---------------------------------------------------------------------------

/// Transcripts found for one page plus the non-fatal per-video issues.
#[derive(Debug, Clone, Default)]
pub struct TranscriptReport {
    /// Keyed by the video's URL.
    pub transcripts: BTreeMap<String, String>,
    pub issues: Vec<ExtractionIssue>,
}

#[derive(Debug)]
enum VideoOutcome {
    Found(String),
    Unavailable(String),
    Exhausted(String),
}

/// Fetch transcripts for every video, at most `concurrency` at a time.
///
/// Each video's `has_transcript` and `transcript_attempts` are filled in.
/// A video that fails, even by panicking inside the fetcher, never affects
/// its siblings.
#[instrument(skip_all, fields(videos = videos.len(), concurrency = concurrency))]
pub async fn acquire<F>(
    videos: &mut [ClassifiedVideo],
    fetcher: Arc<F>,
    policy: RetryPolicy,
    concurrency: usize,
) -> TranscriptReport
where
    F: TranscriptFetcher + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    // Dropping the set aborts every task, so a cancelled caller leaks nothing.
    let mut tasks = JoinSet::new();

    for (index, video) in videos.iter().enumerate() {
        let fetcher = Arc::clone(&fetcher);
        let sem = Arc::clone(&semaphore);
        let target = video.video().clone();

        tasks.spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return (index, VideoOutcome::Exhausted("semaphore closed".into()), 0);
            };
            let (outcome, attempts) = fetch_with_retry(fetcher.as_ref(), &target, policy).await;
            (index, outcome, attempts)
        });
    }

    let mut slots: Vec<Option<(VideoOutcome, u32)>> = videos.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome, attempts)) => slots[index] = Some((outcome, attempts)),
            Err(e) => warn!(error = %e, "transcript task failed"),
        }
    }

    let mut report = TranscriptReport::default();
    for (video, slot) in videos.iter_mut().zip(slots) {
        let label = video.video().to_string();
        let (outcome, attempts) =
            slot.unwrap_or_else(|| (VideoOutcome::Exhausted("transcript task failed".into()), 0));
        video.transcript_attempts = attempts;

        match outcome {
            VideoOutcome::Found(text) => {
                video.has_transcript = Some(true);
                report.transcripts.insert(video.candidate.url.clone(), text);
            }
            VideoOutcome::Unavailable(message) => {
                video.has_transcript = Some(false);
                let err = FlowLensError::TranscriptUnavailable {
                    video: label,
                    message,
                };
                debug!(error = %err, "no transcript");
                report.issues.push(err.to_issue());
            }
            VideoOutcome::Exhausted(message) => {
                video.has_transcript = Some(false);
                let err = FlowLensError::TranscriptTransient {
                    video: label,
                    message,
                };
                warn!(error = %err, attempts, "giving up on transcript");
                report.issues.push(err.to_issue());
            }
        }
    }

    info!(
        found = report.transcripts.len(),
        issues = report.issues.len(),
        "transcript acquisition complete"
    );
    report
}

async fn fetch_with_retry<F: TranscriptFetcher>(
    fetcher: &F,
    video: &VideoRef,
    policy: RetryPolicy,
) -> (VideoOutcome, u32) {
    let mut last_error = String::new();

    for attempt in 1..=policy.max_attempts {
        match fetcher.fetch(video).await {
            FetchOutcome::Transcript(text) => return (VideoOutcome::Found(text), attempt),
            FetchOutcome::Unavailable(message) => {
                return (VideoOutcome::Unavailable(message), attempt);
            }
            FetchOutcome::Transient(message) => {
                let delay = policy.delay_for(attempt);
                debug!(
                    %video,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %message,
                    "transient transcript failure, backing off"
                );
                last_error = message;
                tokio::time::sleep(delay).await;
            }
        }
    }

    (VideoOutcome::Exhausted(last_error), policy.max_attempts)
}
