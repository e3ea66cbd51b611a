//! Context-bag heuristics: page position, location tag, surrounding text.

use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;

use flowlens_shared::{PagePosition, SURROUNDING_TEXT_LIMIT};

/// Class/id fragments that mark a recommendation or sidebar region.
const SIDEBAR_HINTS: &[&str] = &["sidebar", "related", "recommend", "side-bar", "aside"];

/// Class/id fragments that mark a footer region.
const FOOTER_HINTS: &[&str] = &["footer"];

/// Class/id fragments that mark the main content region.
const MAIN_HINTS: &[&str] = &["main", "content", "article", "description"];

/// How many ancestors are consulted for surrounding text.
const TEXT_ANCESTOR_DEPTH: usize = 3;

/// Bytes of raw markup consulted around a regex hit.
const RAW_WINDOW: usize = 400;

/// Bytes of raw markup searched backwards for a container attribute.
const ATTRIBUTE_LOOKBEHIND: usize = 1_500;

/// A classified region plus the token that identified it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Region {
    pub position: PagePosition,
    pub landmark: Option<String>,
}

impl Region {
    fn main() -> Self {
        Self {
            position: PagePosition::MainContent,
            landmark: None,
        }
    }
}

/// Classify one container from its tag name and class/id tokens.
fn classify_container<'a>(tag: &str, tokens: impl IntoIterator<Item = &'a str>) -> Option<Region> {
    match tag {
        "aside" => {
            return Some(Region {
                position: PagePosition::Sidebar,
                landmark: Some("aside".into()),
            });
        }
        "footer" => {
            return Some(Region {
                position: PagePosition::Footer,
                landmark: Some("footer".into()),
            });
        }
        "main" | "article" => return Some(Region::main()),
        _ => {}
    }

    let mut main_seen = false;
    for token in tokens {
        let lower = token.to_lowercase();
        if SIDEBAR_HINTS.iter().any(|h| lower.contains(h)) {
            return Some(Region {
                position: PagePosition::Sidebar,
                landmark: Some(lower),
            });
        }
        if FOOTER_HINTS.iter().any(|h| lower.contains(h)) {
            return Some(Region {
                position: PagePosition::Footer,
                landmark: Some(lower),
            });
        }
        if MAIN_HINTS.iter().any(|h| lower.contains(h)) {
            main_seen = true;
        }
    }

    main_seen.then(Region::main)
}

/// Region of a DOM element.
///
/// A sidebar ancestor anywhere in the chain wins. Otherwise the nearest
/// footer or main landmark decides.
pub(crate) fn element_region(el: &ElementRef) -> Region {
    let mut nearest = None;
    for ancestor in el.ancestors().filter_map(ElementRef::wrap) {
        let value = ancestor.value();
        let tokens = value.classes().chain(value.id());
        match classify_container(value.name(), tokens) {
            Some(region) if region.position == PagePosition::Sidebar => return region,
            Some(region) if nearest.is_none() => nearest = Some(region),
            _ => {}
        }
    }
    nearest.unwrap_or_else(Region::main)
}

/// Region of a raw-markup offset, from the `class`/`id` attributes in the
/// preceding window. Any sidebar hint wins; otherwise the nearest landmark.
pub(crate) fn raw_region(markup: &str, offset: usize) -> Region {
    static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?i)\b(?:class|id)\s*=\s*["']([^"']*)["']"#).expect("valid regex")
    });

    let start = floor_boundary(markup, offset.saturating_sub(ATTRIBUTE_LOOKBEHIND));
    let end = floor_boundary(markup, offset);
    let window = &markup[start..end];

    let mut nearest = None;
    for region in ATTR_RE
        .captures_iter(window)
        .filter_map(|caps| classify_container("", caps[1].split_whitespace()))
    {
        if region.position == PagePosition::Sidebar {
            return region;
        }
        nearest = Some(region);
    }
    nearest.unwrap_or_else(Region::main)
}

/// The coarse location tag: the tier, plus the landmark token if any.
pub(crate) fn location_tag(tier: &str, region: &Region) -> String {
    match &region.landmark {
        Some(landmark) => format!("{tier}/{landmark}"),
        None => tier.to_string(),
    }
}

/// Visible text near an element, capped at [`SURROUNDING_TEXT_LIMIT`] chars.
pub(crate) fn element_text(el: &ElementRef) -> String {
    let own = collapse_whitespace(&el.text().collect::<String>());
    let mut best = own;

    for ancestor in el
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take(TEXT_ANCESTOR_DEPTH)
    {
        if matches!(ancestor.value().name(), "body" | "html") {
            break;
        }
        let text = collapse_whitespace(&ancestor.text().collect::<String>());
        if text.len() > best.len() {
            best = text;
        }
        if best.chars().count() >= SURROUNDING_TEXT_LIMIT {
            break;
        }
    }

    truncate_chars(&best, SURROUNDING_TEXT_LIMIT)
}

/// Visible text around a byte range of raw markup.
pub(crate) fn raw_text(markup: &str, start: usize, end: usize) -> String {
    static TAG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
    static URL_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>]+"#).expect("valid regex"));

    let from = floor_boundary(markup, start.saturating_sub(RAW_WINDOW));
    let to = ceil_boundary(markup, (end + RAW_WINDOW).min(markup.len()));

    let stripped = TAG_RE.replace_all(&markup[from..to], " ");
    let stripped = URL_RE.replace_all(&stripped, " ");
    truncate_chars(&collapse_whitespace(&stripped), SURROUNDING_TEXT_LIMIT)
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn truncate_chars(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

fn floor_boundary(s: &str, mut index: usize) -> usize {
    index = index.min(s.len());
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_boundary(s: &str, mut index: usize) -> usize {
    index = index.min(s.len());
    while !s.is_char_boundary(index) {
        index += 1;
    }
    index
}
