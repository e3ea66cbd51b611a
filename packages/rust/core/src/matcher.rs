//! Spatial-textual matcher: pairs each canvas node with the annotation its
//! author most likely wrote for it.
//!
//! Three tiers run per node, each over every annotation:
//!
//! 1. name containment (always)
//! 2. center-to-center proximity (while the best match is below
//!    `proximity_ceiling`)
//! 3. Jaccard word overlap (while the best match is below `fuzzy_ceiling`)
//!
//! The best match replaces the current one only on a strictly greater
//! confidence, so among equals the first annotation wins. A match is kept only
//! above `min_confidence`; otherwise the node gets method `none`.

use std::collections::HashSet;

use tracing::{debug, instrument};

use flowlens_shared::{
    Annotation, ExtractionMethod, MatcherConfig, Node, NodeContext, Point,
};

/// Annotation text prepared once per call.
struct PreparedAnnotation<'a> {
    annotation: &'a Annotation,
    title: String,
    content: String,
    words: HashSet<String>,
    center: Point,
}

impl<'a> PreparedAnnotation<'a> {
    fn new(annotation: &'a Annotation) -> Self {
        let title = annotation.title.to_lowercase();
        let content = annotation.content.to_lowercase();
        let words = words(&format!("{title} {content}"));
        Self {
            annotation,
            title,
            content,
            words,
            center: annotation.position.center(),
        }
    }
}

struct Candidate<'a> {
    annotation: &'a Annotation,
    confidence: f64,
    method: ExtractionMethod,
}

/// Pair every node with at most one annotation.
///
/// Pure and deterministic: the same input, in the same order, always yields
/// the same output.
#[instrument(skip_all, fields(nodes = nodes.len(), annotations = annotations.len()))]
pub fn match_nodes(
    nodes: &[Node],
    annotations: &[Annotation],
    config: &MatcherConfig,
) -> Vec<NodeContext> {
    let prepared: Vec<PreparedAnnotation<'_>> =
        annotations.iter().map(PreparedAnnotation::new).collect();

    let contexts: Vec<NodeContext> = nodes
        .iter()
        .map(|node| match_node(node, &prepared, config))
        .collect();

    debug!(
        matched = contexts
            .iter()
            .filter(|c| c.extraction_method != ExtractionMethod::None)
            .count(),
        "node matching complete"
    );

    contexts
}

fn match_node(node: &Node, annotations: &[PreparedAnnotation<'_>], config: &MatcherConfig) -> NodeContext {
    let name = node.name.trim().to_lowercase();
    let title = node.display_title().to_lowercase();
    let mut best: Option<Candidate<'_>> = None;

    for ann in annotations {
        let confidence = containment_score(&name, &title, ann, config);
        consider(&mut best, ann, confidence, ExtractionMethod::NameExact);
    }

    if best_confidence(&best) < config.proximity_ceiling {
        for ann in annotations {
            let distance = node.position.distance(&ann.center);
            let confidence = proximity_score(distance, config);
            consider(&mut best, ann, confidence, ExtractionMethod::Proximity);
        }
    }

    if best_confidence(&best) < config.fuzzy_ceiling {
        let node_words = words(&format!("{name} {title}"));
        for ann in annotations {
            let confidence = jaccard(&node_words, &ann.words);
            consider(&mut best, ann, confidence, ExtractionMethod::Fuzzy);
        }
    }

    match best {
        Some(found) if found.confidence > config.min_confidence => NodeContext {
            node_id: node.id.clone(),
            node_name: node.name.clone(),
            node_type: node.node_type.clone(),
            node_position: node.position,
            annotation_id: Some(found.annotation.id.clone()),
            matched_title: Some(found.annotation.title.clone()),
            matched_content: Some(found.annotation.content.clone()),
            match_confidence: found.confidence.clamp(0.0, 1.0),
            extraction_method: found.method,
        },
        _ => NodeContext {
            node_id: node.id.clone(),
            node_name: node.name.clone(),
            node_type: node.node_type.clone(),
            node_position: node.position,
            annotation_id: None,
            matched_title: None,
            matched_content: None,
            match_confidence: 0.0,
            extraction_method: ExtractionMethod::None,
        },
    }
}

fn consider<'a>(
    best: &mut Option<Candidate<'a>>,
    ann: &PreparedAnnotation<'a>,
    confidence: f64,
    method: ExtractionMethod,
) {
    if confidence > best_confidence(best) {
        *best = Some(Candidate {
            annotation: ann.annotation,
            confidence,
            method,
        });
    }
}

fn best_confidence(best: &Option<Candidate<'_>>) -> f64 {
    best.as_ref().map_or(0.0, |b| b.confidence)
}

/// Tier 1: substring containment between node and annotation text.
fn containment_score(
    name: &str,
    title: &str,
    ann: &PreparedAnnotation<'_>,
    config: &MatcherConfig,
) -> f64 {
    let mentions = |needle: &str| {
        !needle.is_empty() && (ann.title.contains(needle) || ann.content.contains(needle))
    };

    if mentions(name) {
        return config.name_confidence;
    }
    if mentions(title) {
        return config.title_confidence;
    }

    let ann_title = ann.title.trim();
    if !ann_title.is_empty() && (name.contains(ann_title) || title.contains(ann_title)) {
        return config.reverse_title_confidence;
    }

    0.0
}

/// Tier 2: stepped confidence by center distance in canvas pixels.
fn proximity_score(distance: f64, config: &MatcherConfig) -> f64 {
    if distance < config.near_px {
        config.near_confidence
    } else if distance < config.mid_px {
        config.mid_confidence
    } else if distance < config.far_px {
        config.far_confidence
    } else {
        0.0
    }
}

/// Tier 3: Jaccard similarity of two word sets.
fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Lower-cased whitespace tokens with surrounding punctuation stripped.
fn words(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}
