//! Page-level helpers: embedded frame listing, preview detection, and raw
//! content signals.

use scraper::{Html, Selector};
use url::Url;

use flowlens_shared::{ClassifierConfig, FrameInput, FrameOrigin, PageSignals};

use crate::context::collapse_whitespace;
use crate::video::parse_video_url;

/// An `<iframe>` found in the hosting document.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRef {
    /// Resolved against the page URL when possible.
    pub src: Option<String>,
    pub title: Option<String>,
    pub origin: FrameOrigin,
}

impl FrameRef {
    /// An unfilled [`FrameInput`] for the host to complete.
    pub fn into_input(self) -> FrameInput {
        FrameInput {
            src: self.src,
            title: self.title,
            origin: self.origin,
            markup: None,
            fetch_error: None,
        }
    }
}

/// List the frames of a hosting document that may hold more content.
///
/// Frames that are themselves video players are left out; they are
/// candidates, not contexts.
pub fn list_frames(host_markup: &str, page_url: Option<&str>) -> Vec<FrameRef> {
    let doc = Html::parse_document(host_markup);
    let sel = Selector::parse("iframe").unwrap();
    let base = page_url.and_then(|u| Url::parse(u).ok());

    let mut frames = Vec::new();
    for el in doc.select(&sel) {
        let raw_src = el
            .value()
            .attr("src")
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if raw_src.is_some_and(|s| parse_video_url(s).is_some()) {
            continue;
        }

        let resolved = raw_src.and_then(|s| match &base {
            Some(base) => base.join(s).ok(),
            None => Url::parse(s).ok(),
        });
        let origin = frame_origin(resolved.as_ref(), base.as_ref(), raw_src);
        let src = resolved
            .map(|u| u.to_string())
            .or_else(|| raw_src.map(str::to_string));

        frames.push(FrameRef {
            src,
            title: el
                .value()
                .attr("title")
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            origin,
        });
    }
    frames
}

fn frame_origin(resolved: Option<&Url>, base: Option<&Url>, raw_src: Option<&str>) -> FrameOrigin {
    let Some(raw) = raw_src else {
        return FrameOrigin::SameContext;
    };
    if raw.starts_with("about:") || raw.starts_with("data:") {
        return FrameOrigin::SameContext;
    }
    match (resolved, base) {
        (Some(frame), Some(page)) if frame.origin() == page.origin() => FrameOrigin::SameContext,
        (Some(_), _) => FrameOrigin::CrossOrigin,
        // Unresolvable relative src without a page URL: same document origin.
        (None, _) => FrameOrigin::SameContext,
    }
}

/// Whether a frame is the workflow-preview embed.
///
/// `preview_markers` are checked against `src` and `title`;
/// `preview_title_markers` against the title alone.
pub fn is_preview_frame(frame: &FrameInput, config: &ClassifierConfig) -> bool {
    let contains_any = |haystack: &str, markers: &[String]| {
        let haystack = haystack.to_lowercase();
        markers.iter().any(|m| haystack.contains(&m.to_lowercase()))
    };

    let src_hit = frame
        .src
        .as_deref()
        .is_some_and(|src| contains_any(src, &config.preview_markers));
    let title_hit = frame.title.as_deref().is_some_and(|title| {
        contains_any(title, &config.preview_markers)
            || contains_any(title, &config.preview_title_markers)
    });
    src_hit || title_hit
}

/// Count visible text, images and links in a document.
pub fn page_signals(markup: &str) -> PageSignals {
    let doc = Html::parse_document(markup);
    let body_sel = Selector::parse("body").unwrap();
    let img_sel = Selector::parse("img").unwrap();
    let link_sel = Selector::parse("a[href]").unwrap();

    let text_length = doc
        .select(&body_sel)
        .next()
        .map(|body| {
            let visible: String = body
                .descendants()
                .filter_map(|node| {
                    let text = node.value().as_text()?;
                    let parent = node.parent()?.value().as_element()?;
                    (!matches!(parent.name(), "script" | "style" | "noscript" | "template"))
                        .then(|| format!("{} ", &**text))
                })
                .collect();
            collapse_whitespace(&visible).chars().count()
        })
        .unwrap_or(0);

    PageSignals {
        text_length,
        image_count: doc.select(&img_sel).count(),
        link_count: doc.select(&link_sel).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = r#"<html><body>
        <iframe src="/embed/workflow-preview/42" title="Workflow preview"></iframe>
        <iframe src="https://preview.n8n-demo.example.com/render?id=42"></iframe>
        <iframe src="https://www.youtube.com/embed/dQw4w9WgXcQ"></iframe>
        <iframe srcdoc="<p>inline</p>"></iframe>
    </body></html>"#;

    #[test]
    fn lists_frames_with_origin() {
        let frames = list_frames(HOST, Some("https://marketplace.example.com/workflows/42"));
        assert_eq!(frames.len(), 3);

        assert_eq!(
            frames[0].src.as_deref(),
            Some("https://marketplace.example.com/embed/workflow-preview/42")
        );
        assert_eq!(frames[0].origin, FrameOrigin::SameContext);
        assert_eq!(frames[0].title.as_deref(), Some("Workflow preview"));

        assert_eq!(frames[1].origin, FrameOrigin::CrossOrigin);
        assert_eq!(frames[2].src, None);
        assert_eq!(frames[2].origin, FrameOrigin::SameContext);
    }

    #[test]
    fn absolute_frames_without_page_url_are_cross_origin() {
        let frames = list_frames(HOST, None);
        assert_eq!(frames[0].origin, FrameOrigin::SameContext);
        assert_eq!(frames[1].origin, FrameOrigin::CrossOrigin);
    }

    #[test]
    fn preview_detection_uses_src_and_title() {
        let config = ClassifierConfig::default();
        let frame = FrameInput {
            src: Some("https://preview.N8N-DEMO.example.com/x".into()),
            title: None,
            origin: FrameOrigin::CrossOrigin,
            markup: None,
            fetch_error: None,
        };
        assert!(is_preview_frame(&frame, &config));

        let titled = FrameInput {
            src: Some("https://render.example.com/x".into()),
            title: Some("Workflow canvas".into()),
            ..frame.clone()
        };
        assert!(is_preview_frame(&titled, &config));

        let other = FrameInput {
            src: Some("https://ads.example.com/banner".into()),
            title: Some("Advertisement".into()),
            ..frame
        };
        assert!(!is_preview_frame(&other, &config));
    }

    #[test]
    fn bare_workflow_in_src_is_not_a_preview() {
        let frame = FrameInput {
            src: Some("https://widgets.example.com/related-workflows?for=42".into()),
            title: Some("Recommended".into()),
            origin: FrameOrigin::CrossOrigin,
            markup: None,
            fetch_error: None,
        };
        assert!(!is_preview_frame(&frame, &ClassifierConfig::default()));
    }

    #[test]
    fn signals_ignore_scripts() {
        let html = r#"<html><head><title>t</title></head><body>
            <p>Hello   world</p>
            <script>var hidden = "not counted";</script>
            <img src="a.png"><img src="b.png">
            <a href="/x">x</a>
        </body></html>"#;
        let signals = page_signals(html);
        assert_eq!(signals.text_length, "Hello world x".len());
        assert_eq!(signals.image_count, 2);
        assert_eq!(signals.link_count, 1);
    }
}
