//! End-to-end page extraction: canvas → discovery → classify → dedupe →
//! match → transcripts → score.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use flowlens_discovery::{discover, load_canvas, page_signals};
use flowlens_shared::{
    AppConfig, ClassifiedVideo, DedupStats, ExtractionIssue, ExtractionResult, NodeContext,
    PageInput, PageSignals, Result,
};

use crate::classifier::classify;
use crate::dedup::dedupe;
use crate::matcher::match_nodes;
use crate::quality;
use crate::transcript::{RetryPolicy, TranscriptFetcher, TranscriptReport, acquire};

/// Everything extraction produces before any transcript is fetched.
#[derive(Debug, Clone)]
pub struct PageAnalysis {
    pub node_contexts: Vec<NodeContext>,
    /// Deduplicated, in first-discovery order.
    pub videos: Vec<ClassifiedVideo>,
    pub dedup_stats: DedupStats,
    pub page_signals: PageSignals,
    /// Non-fatal conditions met so far.
    pub issues: Vec<ExtractionIssue>,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes, successfully or not.
    fn done(&self, result: &ExtractionResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _result: &ExtractionResult) {}
}

/// Run every synchronous phase over one page.
///
/// Fails only when the canvas cannot be located or parsed; everything past
/// that point degrades into [`PageAnalysis::issues`].
#[instrument(skip_all, fields(page = input.page_url.as_deref().unwrap_or("<unknown>")))]
pub fn analyze_page(input: &PageInput, config: &AppConfig) -> Result<PageAnalysis> {
    let canvas = load_canvas(input)?;
    info!(
        nodes = canvas.nodes.len(),
        annotations = canvas.annotations.len(),
        "canvas loaded"
    );

    let discovery = discover(input, &config.classifier);
    let classified = classify(&discovery.candidates, &config.classifier);
    let deduped = dedupe(classified);
    let node_contexts = match_nodes(&canvas.nodes, &canvas.annotations, &config.matcher);
    let signals = input
        .signals
        .unwrap_or_else(|| page_signals(&input.host_markup));

    Ok(PageAnalysis {
        node_contexts,
        videos: deduped.unique,
        dedup_stats: deduped.stats,
        page_signals: signals,
        issues: discovery.issues,
    })
}

/// Extract one page, fetching transcripts through `fetcher`.
///
/// Never fails: a missing canvas, or any other error before transcripts, is
/// returned as a `success=false` result carrying the error.
#[instrument(skip_all, fields(page = input.page_url.as_deref().unwrap_or("<unknown>")))]
pub async fn extract_page<F>(
    input: &PageInput,
    fetcher: Arc<F>,
    config: &AppConfig,
    progress: &dyn ProgressReporter,
) -> ExtractionResult
where
    F: TranscriptFetcher + 'static,
{
    let start = Instant::now();
    progress.phase("Analyzing page");
    let mut analysis = match analyze_page(input, config) {
        Ok(analysis) => analysis,
        Err(e) => return abort(input, e, progress),
    };

    progress.phase("Fetching transcripts");
    let report = acquire(
        &mut analysis.videos,
        fetcher,
        RetryPolicy::from(&config.transcripts),
        config.transcripts.concurrency,
    )
    .await;

    progress.phase("Scoring");
    let result = assemble(input, analysis, report);
    info!(
        score = result.quality_score,
        videos = result.videos.len(),
        transcripts = result.transcripts.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "extraction complete"
    );
    progress.done(&result);
    result
}

/// Extract one page without attempting any transcript.
///
/// Videos keep `has_transcript = None` so a consumer can tell "never tried"
/// from "confirmed unavailable".
#[instrument(skip_all, fields(page = input.page_url.as_deref().unwrap_or("<unknown>")))]
pub fn extract_page_offline(
    input: &PageInput,
    config: &AppConfig,
    progress: &dyn ProgressReporter,
) -> ExtractionResult {
    progress.phase("Analyzing page");
    let analysis = match analyze_page(input, config) {
        Ok(analysis) => analysis,
        Err(e) => return abort(input, e, progress),
    };

    progress.phase("Scoring");
    let result = assemble(input, analysis, TranscriptReport::default());
    info!(
        score = result.quality_score,
        videos = result.videos.len(),
        "extraction complete"
    );
    progress.done(&result);
    result
}

fn abort(
    input: &PageInput,
    err: flowlens_shared::FlowLensError,
    progress: &dyn ProgressReporter,
) -> ExtractionResult {
    error!(error = %err, fatal = err.is_fatal(), "page extraction aborted");
    let result = ExtractionResult::failed(input.page_url.clone(), err.to_issue());
    progress.done(&result);
    result
}

fn assemble(input: &PageInput, analysis: PageAnalysis, report: TranscriptReport) -> ExtractionResult {
    let mut errors = analysis.issues;
    errors.extend(report.issues);

    let mut result = ExtractionResult {
        run_id: Uuid::now_v7(),
        page_url: input.page_url.clone(),
        extracted_at: Utc::now(),
        success: true,
        node_contexts: analysis.node_contexts,
        videos: analysis.videos,
        transcripts: report.transcripts,
        quality_score: 0,
        dedup_stats: analysis.dedup_stats,
        page_signals: analysis.page_signals,
        errors,
    };
    result.quality_score = quality::score(&result);
    result
}
