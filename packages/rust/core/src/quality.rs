//! Composite extraction quality score.

use flowlens_shared::{Classification, ExtractionResult};

const ANY_VIDEO: u32 = 20;
const PRIMARY_EXPLAINER: u32 = 20;
const ANY_TRANSCRIPT: u32 = 20;
const FULL_COVERAGE: u32 = 10;
const TEXT_OVER_1000: u32 = 10;
const TEXT_OVER_5000: u32 = 10;
const ANY_IMAGE: u32 = 5;
const MANY_LINKS: u32 = 5;

/// Score a result in `[0, 100]`.
pub fn score(result: &ExtractionResult) -> u8 {
    let videos = &result.videos;
    let signals = &result.page_signals;
    let mut total = 0u32;

    if !videos.is_empty() {
        total += ANY_VIDEO;
    }
    if videos
        .iter()
        .any(|v| v.classification == Classification::PrimaryExplainer)
    {
        total += PRIMARY_EXPLAINER;
    }
    if !result.transcripts.is_empty() {
        total += ANY_TRANSCRIPT;
    }
    if !videos.is_empty()
        && videos
            .iter()
            .all(|v| result.transcripts.contains_key(&v.candidate.url))
    {
        total += FULL_COVERAGE;
    }
    if signals.text_length > 1000 {
        total += TEXT_OVER_1000;
    }
    if signals.text_length > 5000 {
        total += TEXT_OVER_5000;
    }
    if signals.image_count > 0 {
        total += ANY_IMAGE;
    }
    if signals.link_count > 5 {
        total += MANY_LINKS;
    }

    total.min(100) as u8
}
