//! Merge video candidates found through more than one discovery path.

use std::collections::HashMap;

use tracing::{info, instrument};

use flowlens_shared::{ClassifiedVideo, DedupStats, VideoRef};

/// Unique videos plus the counts that describe discovery noise.
#[derive(Debug, Clone, Default)]
pub struct Deduplicated {
    pub unique: Vec<ClassifiedVideo>,
    pub stats: DedupStats,
}

/// Keep one entry per platform video.
///
/// On collision the higher classification priority wins; equal priorities
/// keep the first-seen entry. The kept entry occupies the slot where its
/// video was first seen.
#[instrument(skip_all, fields(raw = classified.len()))]
pub fn dedupe(classified: Vec<ClassifiedVideo>) -> Deduplicated {
    let raw = classified.len();
    let mut slots: HashMap<VideoRef, usize> = HashMap::new();
    let mut unique: Vec<ClassifiedVideo> = Vec::new();

    for video in classified {
        match slots.get(video.video()) {
            Some(&slot) => {
                if video.classification.priority() > unique[slot].classification.priority() {
                    unique[slot] = video;
                }
            }
            None => {
                slots.insert(video.video().clone(), unique.len());
                unique.push(video);
            }
        }
    }

    let stats = DedupStats {
        raw,
        unique: unique.len(),
        removed: raw - unique.len(),
    };
    info!(
        raw = stats.raw,
        unique = stats.unique,
        removed = stats.removed,
        "video deduplication complete"
    );

    Deduplicated { unique, stats }
}
