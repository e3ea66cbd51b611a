//! Video reference detection inside one markup context.
//!
//! Three detectors run per context: anchors to known video-host URL shapes,
//! inline embed elements, and a regex sweep over the raw markup (which also
//! picks up provider shorthand notations such as `@[youtube](ID)`).

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace};
use url::Url;

use flowlens_shared::{
    CandidateContext, ContextTier, DiscoveryType, PagePosition, Platform, VideoCandidate, VideoRef,
};

use crate::context::{self, Region};

/// 11-character tokens that appear in YouTube embed paths but are not videos.
const YOUTUBE_RESERVED_IDS: &[&str] = &["videoseries", "live_stream"];

// ---------------------------------------------------------------------------
// URL shapes
// ---------------------------------------------------------------------------

/// Parse a link or embed URL into a validated video reference.
///
/// Channel, user, playlist and handle links return `None`, as does any ID
/// that fails the platform's length/charset check.
pub fn parse_video_url(raw: &str) -> Option<VideoRef> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let absolute = if trimmed.starts_with("//") {
        format!("https:{trimmed}")
    } else if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&absolute).ok()?;
    let host = url.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let host = host.strip_prefix("m.").unwrap_or(host);

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();

    match host {
        "youtube.com" | "youtube-nocookie.com" => {
            let id = match segments.as_slice() {
                ["watch"] => url
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned())?,
                ["embed", id] | ["v", id] | ["shorts", id] | ["live", id] => id.to_string(),
                _ => return None,
            };
            youtube_ref(&id)
        }
        "youtu.be" => match segments.as_slice() {
            [id] => youtube_ref(id),
            _ => None,
        },
        "vimeo.com" => match segments.as_slice() {
            [id] => VideoRef::new(Platform::Vimeo, *id).ok(),
            _ => None,
        },
        "player.vimeo.com" => match segments.as_slice() {
            ["video", id] => VideoRef::new(Platform::Vimeo, *id).ok(),
            _ => None,
        },
        _ => None,
    }
}

fn youtube_ref(id: &str) -> Option<VideoRef> {
    if YOUTUBE_RESERVED_IDS.contains(&id) {
        return None;
    }
    VideoRef::new(Platform::Youtube, id).ok()
}

// ---------------------------------------------------------------------------
// Regex sweep
// ---------------------------------------------------------------------------

/// Patterns swept over raw markup. Capture group 1 is the candidate ID; it is
/// matched greedily and validated afterwards so that over-long IDs are
/// rejected instead of truncated.
static SWEEP_PATTERNS: LazyLock<Vec<(Platform, Regex)>> = LazyLock::new(|| {
    let patterns: &[(Platform, &str)] = &[
        (
            Platform::Youtube,
            r#"(?i:(?:https?:)?//)?\b(?i:(?:www\.|m\.)?(?:youtube(?:-nocookie)?\.com/(?:watch\?(?:[^"'\s<>]*?&(?:amp;)?)?v=|embed/|v/|shorts/|live/)|youtu\.be/))([A-Za-z0-9_-]+)"#,
        ),
        (
            Platform::Vimeo,
            r"(?i:(?:https?:)?//)?\b(?i:(?:player\.)?vimeo\.com/(?:video/)?)(\d+)",
        ),
        (Platform::Youtube, r"@\[youtube\]\(\s*([A-Za-z0-9_-]+)\s*\)"),
        (Platform::Vimeo, r"@\[vimeo\]\(\s*(\d+)\s*\)"),
        (Platform::Youtube, r"\{%\s*youtube\s+([A-Za-z0-9_-]+)\s*%\}"),
        (
            Platform::Youtube,
            r#"\[youtube\s+(?:id=)?["']?([A-Za-z0-9_-]+)["']?\s*\]"#,
        ),
    ];
    patterns
        .iter()
        .map(|(platform, re)| (*platform, Regex::new(re).expect("valid regex")))
        .collect()
});

/// One regex hit in raw text.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepHit {
    pub video: VideoRef,
    /// The literal matched text.
    pub literal: String,
    pub start: usize,
    pub end: usize,
}

/// Undo the escaping JSON/JS payloads apply to URLs so the patterns match.
pub(crate) fn normalize_raw(text: &str) -> String {
    text.replace("\\/", "/")
        .replace("\\u0026", "&")
        .replace("\\u003d", "=")
        .replace("\\u003D", "=")
}

/// Sweep every pattern over `text`, in pattern order then position order.
pub fn sweep(text: &str) -> Vec<SweepHit> {
    let mut hits = Vec::new();
    for (platform, re) in SWEEP_PATTERNS.iter() {
        for caps in re.captures_iter(text) {
            let (Some(whole), Some(id)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let video = match platform {
                Platform::Youtube => youtube_ref(id.as_str()),
                Platform::Vimeo => VideoRef::new(Platform::Vimeo, id.as_str()).ok(),
            };
            match video {
                Some(video) => hits.push(SweepHit {
                    video,
                    literal: whole.as_str().to_string(),
                    start: whole.start(),
                    end: whole.end(),
                }),
                None => trace!(literal = whole.as_str(), "rejected malformed video id"),
            }
        }
    }
    hits
}

// ---------------------------------------------------------------------------
// Context scan
// ---------------------------------------------------------------------------

/// Where a markup context sits relative to the page.
#[derive(Debug, Clone, Copy)]
pub struct ScanScope<'a> {
    pub tier: ContextTier,
    pub container_src: Option<&'a str>,
    pub container_title: Option<&'a str>,
    /// The whole context is the workflow-preview embed.
    pub in_workflow_preview: bool,
}

/// Collects candidates for one context, skipping repeated literal links.
struct Collector<'a> {
    scope: ScanScope<'a>,
    literals: HashSet<(String, PagePosition)>,
    ids: HashSet<VideoRef>,
    out: Vec<VideoCandidate>,
}

impl<'a> Collector<'a> {
    fn new(scope: ScanScope<'a>) -> Self {
        Self {
            scope,
            literals: HashSet::new(),
            ids: HashSet::new(),
            out: Vec::new(),
        }
    }

    fn push(
        &mut self,
        video: VideoRef,
        literal: &str,
        discovery_type: DiscoveryType,
        region: Region,
        surrounding_text: String,
        in_preview: bool,
    ) {
        if !self.literals.insert((literal.to_string(), region.position)) {
            trace!(%video, literal, "literal link already recorded in this context");
            return;
        }
        self.ids.insert(video.clone());

        let context = CandidateContext {
            tier: self.scope.tier,
            location: context::location_tag(self.scope.tier.as_str(), &region),
            surrounding_text,
            position: region.position,
            container_src: self.scope.container_src.map(str::to_string),
            container_title: self.scope.container_title.map(str::to_string),
            in_workflow_preview: self.scope.in_workflow_preview || in_preview,
        };

        debug!(
            %video,
            ?discovery_type,
            position = ?context.position,
            location = %context.location,
            "video candidate"
        );

        self.out.push(VideoCandidate {
            url: video.canonical_url(),
            video,
            discovery_type,
            context,
        });
    }
}

/// Find every video reference in one markup context.
///
/// Detector order: preview elements, embeds, anchors, then the raw sweep.
/// The raw sweep skips IDs a DOM detector already produced in this context.
pub fn scan_context(markup: &str, scope: ScanScope<'_>) -> Vec<VideoCandidate> {
    let doc = Html::parse_document(markup);
    let mut collector = Collector::new(scope);

    scan_preview_elements(&doc, &mut collector);
    scan_embeds(&doc, &mut collector);
    scan_anchors(&doc, &mut collector);
    scan_raw(markup, &mut collector);

    collector.out
}

/// `<n8n-demo>` and similar elements carry the workflow (and its notes) in
/// attributes; whatever they reference belongs to the preview.
fn scan_preview_elements(doc: &Html, collector: &mut Collector<'_>) {
    let sel = Selector::parse("n8n-demo, [data-workflow]").unwrap();
    for el in doc.select(&sel) {
        let region = context::element_region(&el);
        for (_, value) in el.value().attrs() {
            let decoded = urlencoding::decode(value)
                .map(|d| d.into_owned())
                .unwrap_or_else(|_| value.to_string());
            let text = normalize_raw(&decoded);
            for hit in sweep(&text) {
                let surrounding = context::raw_text(&text, hit.start, hit.end);
                collector.push(
                    hit.video,
                    &hit.literal,
                    DiscoveryType::RegexDiscovered,
                    region.clone(),
                    surrounding,
                    true,
                );
            }
        }
    }
}

fn scan_embeds(doc: &Html, collector: &mut Collector<'_>) {
    let sel = Selector::parse(
        "iframe[src], embed[src], object[data], lite-youtube[videoid], \
         [data-youtube-id], [data-vimeo-id], [data-video-id]",
    )
    .unwrap();

    for el in doc.select(&sel) {
        let Some((video, literal)) = embed_reference(&el) else {
            continue;
        };
        let region = context::element_region(&el);
        let text = context::element_text(&el);
        collector.push(video, &literal, DiscoveryType::HtmlEmbed, region, text, false);
    }
}

fn embed_reference(el: &ElementRef) -> Option<(VideoRef, String)> {
    let value = el.value();
    for attr in ["src", "data"] {
        if let Some(src) = value.attr(attr) {
            if let Some(video) = parse_video_url(src) {
                return Some((video, src.to_string()));
            }
        }
    }

    let by_attr = [
        ("videoid", Some(Platform::Youtube)),
        ("data-youtube-id", Some(Platform::Youtube)),
        ("data-vimeo-id", Some(Platform::Vimeo)),
        ("data-video-id", None),
    ];
    for (attr, platform) in by_attr {
        let Some(id) = value.attr(attr).map(str::trim) else {
            continue;
        };
        let video = match platform {
            Some(Platform::Youtube) => youtube_ref(id),
            Some(Platform::Vimeo) => VideoRef::new(Platform::Vimeo, id).ok(),
            None => youtube_ref(id).or_else(|| VideoRef::new(Platform::Vimeo, id).ok()),
        };
        if let Some(video) = video {
            return Some((video, format!("{attr}={id}")));
        }
    }
    None
}

fn scan_anchors(doc: &Html, collector: &mut Collector<'_>) {
    let sel = Selector::parse("a[href]").unwrap();
    for el in doc.select(&sel) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let Some(video) = parse_video_url(href) else {
            continue;
        };
        let region = context::element_region(&el);
        let text = context::element_text(&el);
        collector.push(video, href, DiscoveryType::VideoLink, region, text, false);
    }
}

fn scan_raw(markup: &str, collector: &mut Collector<'_>) {
    let text = normalize_raw(markup);
    for hit in sweep(&text) {
        if collector.ids.contains(&hit.video) {
            continue;
        }
        let region = context::raw_region(&text, hit.start);
        let surrounding = context::raw_text(&text, hit.start, hit.end);
        collector.push(
            hit.video,
            &hit.literal,
            DiscoveryType::RegexDiscovered,
            region,
            surrounding,
            false,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_scope() -> ScanScope<'static> {
        ScanScope {
            tier: ContextTier::HostDocument,
            container_src: None,
            container_title: None,
            in_workflow_preview: false,
        }
    }

    #[test]
    fn parses_known_url_shapes() {
        let cases = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "//www.youtube-nocookie.com/embed/dQw4w9WgXcQ?rel=0",
            "https://m.youtube.com/shorts/dQw4w9WgXcQ",
            "youtube.com/v/dQw4w9WgXcQ",
        ];
        for case in cases {
            let video = parse_video_url(case).unwrap_or_else(|| panic!("no match: {case}"));
            assert_eq!(video.id(), "dQw4w9WgXcQ", "{case}");
        }

        let vimeo = parse_video_url("https://player.vimeo.com/video/76979871").unwrap();
        assert_eq!(vimeo.platform(), Platform::Vimeo);
        assert_eq!(parse_video_url("https://vimeo.com/76979871").unwrap(), vimeo);
    }

    #[test]
    fn rejects_channels_playlists_and_malformed_ids() {
        let rejected = [
            "https://www.youtube.com/channel/UCabcdefghijk",
            "https://www.youtube.com/@n8n-io",
            "https://www.youtube.com/playlist?list=PLabc",
            "https://www.youtube.com/embed/videoseries?list=PLabc",
            "https://www.youtube.com/watch?v=0123456789",
            "https://youtu.be/dQw4w9WgXcQQ",
            "https://vimeo.com/channels/staffpicks",
            "https://example.com/watch?v=dQw4w9WgXcQ",
            "not a url",
        ];
        for case in rejected {
            assert!(parse_video_url(case).is_none(), "should reject {case}");
        }
    }

    #[test]
    fn sweep_finds_shorthand_and_escaped_urls() {
        let text = normalize_raw(
            r###"{"content":"## Demo\n@[youtube](dQw4w9WgXcQ)\nSee https:\/\/vimeo.com\/76979871"}"###,
        );
        let hits = sweep(&text);
        let ids: Vec<&str> = hits.iter().map(|h| h.video.id()).collect();
        assert!(ids.contains(&"dQw4w9WgXcQ"));
        assert!(ids.contains(&"76979871"));
    }

    #[test]
    fn sweep_finds_each_shorthand_notation() {
        let cases = [
            ("{% youtube dQw4w9WgXcQ %}", Platform::Youtube, "dQw4w9WgXcQ"),
            ("[youtube id=dQw4w9WgXcQ]", Platform::Youtube, "dQw4w9WgXcQ"),
            ("[youtube id=\"dQw4w9WgXcQ\"]", Platform::Youtube, "dQw4w9WgXcQ"),
            ("@[youtube](dQw4w9WgXcQ)", Platform::Youtube, "dQw4w9WgXcQ"),
            ("@[vimeo](76979871)", Platform::Vimeo, "76979871"),
        ];
        for (text, platform, id) in cases {
            let hits = sweep(&format!("<p>Intro {text} outro</p>"));
            assert_eq!(hits.len(), 1, "{text}");
            assert_eq!(hits[0].video.platform(), platform, "{text}");
            assert_eq!(hits[0].video.id(), id, "{text}");
            assert_eq!(hits[0].literal, text);
        }
    }

    #[test]
    fn sweep_requires_host_boundary() {
        assert!(sweep("https://notyoutube.com/embed/dQw4w9WgXcQ").is_empty());
        assert!(sweep("https://myvimeo.com/76979871").is_empty());
        assert!(sweep("see fakeyoutu.be/dQw4w9WgXcQ").is_empty());
        assert_eq!(sweep("(youtu.be/dQw4w9WgXcQ)").len(), 1);
        assert_eq!(sweep("\"//player.vimeo.com/video/76979871\"").len(), 1);
    }

    #[test]
    fn sweep_rejects_wrong_length_ids() {
        let hits = sweep("youtu.be/0123456789 and youtube.com/embed/abcdefghijkl");
        assert!(hits.is_empty());
    }

    #[test]
    fn sweep_handles_html_escaped_query() {
        let hits = sweep(r#"<a href="https://www.youtube.com/watch?list=x&amp;v=dQw4w9WgXcQ">"#);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].video.id(), "dQw4w9WgXcQ");
    }

    #[test]
    fn scan_detects_anchor_embed_and_sidebar() {
        let html = r#"<html><body>
            <main>
              <p>Watch this workflow tutorial first</p>
              <iframe src="https://www.youtube.com/embed/dQw4w9WgXcQ" title="Explainer"></iframe>
            </main>
            <aside class="related-workflows">
              <a href="https://youtu.be/9bZkp7q19f0">Another workflow</a>
            </aside>
        </body></html>"#;

        let found = scan_context(html, host_scope());
        assert_eq!(found.len(), 2);

        let embed = &found[0];
        assert_eq!(embed.discovery_type, DiscoveryType::HtmlEmbed);
        assert_eq!(embed.context.position, PagePosition::MainContent);
        assert!(embed.context.surrounding_text.contains("workflow tutorial"));

        let link = &found[1];
        assert_eq!(link.discovery_type, DiscoveryType::VideoLink);
        assert_eq!(link.video.id(), "9bZkp7q19f0");
        assert_eq!(link.context.position, PagePosition::Sidebar);
        assert_eq!(link.context.location, "host_document/aside");
    }

    #[test]
    fn content_container_inside_sidebar_stays_sidebar() {
        let html = r#"<html><body>
            <main><p>Intro</p></main>
            <div class="sidebar">
              <div class="card-content">
                <iframe src="https://www.youtube.com/embed/kJQP7kiw5Fk"></iframe>
              </div>
            </div>
            <aside class="related-workflows">
              <article class="card"><a href="https://youtu.be/9bZkp7q19f0">Next</a></article>
            </aside>
        </body></html>"#;

        let found = scan_context(html, host_scope());
        assert_eq!(found.len(), 2);
        assert!(
            found.iter().all(|c| c.context.position == PagePosition::Sidebar),
            "{found:?}"
        );
        assert_eq!(found[0].context.location, "host_document/sidebar");
    }

    #[test]
    fn raw_sweep_skips_ids_found_by_dom() {
        let html = r#"<html><body>
            <a href="https://youtu.be/dQw4w9WgXcQ">video</a>
            <script>var v = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";</script>
        </body></html>"#;
        let found = scan_context(html, host_scope());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].discovery_type, DiscoveryType::VideoLink);
    }

    #[test]
    fn same_literal_link_is_recorded_once() {
        let html = r#"<html><body><div>
            <a href="https://youtu.be/dQw4w9WgXcQ">one</a>
            <a href="https://youtu.be/dQw4w9WgXcQ">two</a>
        </div></body></html>"#;
        assert_eq!(scan_context(html, host_scope()).len(), 1);
    }

    #[test]
    fn lite_youtube_and_data_attributes() {
        let html = r#"<html><body>
            <lite-youtube videoid="dQw4w9WgXcQ"></lite-youtube>
            <div data-video-id="76979871"></div>
            <div data-youtube-id="short"></div>
        </body></html>"#;
        let found = scan_context(html, host_scope());
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|c| c.discovery_type == DiscoveryType::HtmlEmbed));
        assert_eq!(found[1].video.platform(), Platform::Vimeo);
    }

    #[test]
    fn preview_element_attributes_are_flagged() {
        let workflow = r#"{"nodes":[{"type":"n8n-nodes-base.stickyNote","parameters":{"content":"@[youtube](dQw4w9WgXcQ)"}}]}"#;
        let html = format!(
            r#"<html><body><n8n-demo workflow="{}"></n8n-demo></body></html>"#,
            urlencoding::encode(workflow)
        );
        let found = scan_context(&html, host_scope());
        assert_eq!(found.len(), 1);
        assert!(found[0].context.in_workflow_preview);
        assert_eq!(found[0].discovery_type, DiscoveryType::RegexDiscovered);
    }

    #[test]
    fn frame_scope_is_carried() {
        let scope = ScanScope {
            tier: ContextTier::CrossOriginFrame,
            container_src: Some("https://preview.example.com/workflow-preview/1"),
            container_title: Some("Workflow preview"),
            in_workflow_preview: true,
        };
        let found = scan_context("Intro video: https://youtu.be/dQw4w9WgXcQ", scope);
        assert_eq!(found.len(), 1);
        let ctx = &found[0].context;
        assert_eq!(ctx.tier, ContextTier::CrossOriginFrame);
        assert!(ctx.in_workflow_preview);
        assert_eq!(ctx.container_title.as_deref(), Some("Workflow preview"));
        assert_eq!(ctx.surrounding_text, "Intro video:");
    }
}
