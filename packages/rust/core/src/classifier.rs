//! Video classification: decide whether each candidate is this workflow's own
//! explainer or unrelated/recommended content.
//!
//! The preview embed is where an author places the workflow's explainer.
//! Sidebar and recommendation widgets reference other workflows and must not
//! be treated as describing this one.

use tracing::{debug, instrument};

use flowlens_shared::{
    Classification, ClassifiedVideo, ClassifierConfig, DiscoveryType, PagePosition,
    VideoCandidate,
};

/// Classify every candidate, in order. The first candidate overall earns a
/// confidence bonus on the embed rules.
#[instrument(skip_all, fields(candidates = candidates.len()))]
pub fn classify(candidates: &[VideoCandidate], config: &ClassifierConfig) -> Vec<ClassifiedVideo> {
    candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| {
            let (classification, confidence) = classify_one(candidate, index == 0, config);
            debug!(
                video = %candidate.video,
                ?classification,
                confidence,
                "classified video"
            );
            ClassifiedVideo {
                candidate: candidate.clone(),
                classification,
                confidence,
                has_transcript: None,
                transcript_attempts: 0,
            }
        })
        .collect()
}

/// First matching rule wins.
fn classify_one(
    candidate: &VideoCandidate,
    is_first: bool,
    config: &ClassifierConfig,
) -> (Classification, f64) {
    let ctx = &candidate.context;
    let main = ctx.position == PagePosition::MainContent;
    let text = ctx.surrounding_text.to_lowercase();
    let container_title = ctx
        .container_title
        .as_deref()
        .map(str::to_lowercase)
        .unwrap_or_default();

    if ctx.in_workflow_preview && main {
        let confidence = if is_first {
            config.preview_first_confidence
        } else {
            config.preview_confidence
        };
        return (Classification::PrimaryExplainer, confidence);
    }

    if candidate.discovery_type == DiscoveryType::HtmlEmbed && main {
        let confidence = if is_first {
            config.embed_first_confidence
        } else {
            config.embed_confidence
        };
        return (Classification::PrimaryExplainer, confidence);
    }

    if main
        && (contains_any(&text, &config.explainer_keywords)
            || contains_any(&container_title, &config.explainer_keywords))
    {
        return (Classification::PrimaryExplainer, config.keyword_confidence);
    }

    if ctx.position == PagePosition::Sidebar || ctx.location.to_lowercase().contains("related") {
        return (Classification::RelatedWorkflow, config.related_confidence);
    }

    if contains_any(&text, &config.tutorial_keywords) {
        return (Classification::Tutorial, config.tutorial_confidence);
    }

    if ctx.in_workflow_preview {
        return (Classification::PrimaryExplainer, config.preview_fallback_confidence);
    }

    (Classification::Other, config.other_confidence)
}

fn contains_any(haystack: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .any(|k| !k.is_empty() && haystack.contains(&k.to_lowercase()))
}
