//! Workflow definition parsing: JSON → canvas [`Node`]s and [`Annotation`]s.
//!
//! Positions come from the workflow definition, never from DOM layout (the
//! rendered canvas is transform-distorted).

use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use flowlens_shared::{Annotation, AnnotationBox, FlowLensError, Node, PageInput, Point, Result};

/// Node types containing this marker are free-floating notes, not steps.
const STICKY_NOTE_MARKER: &str = "stickynote";

/// Nodes and annotations of one workflow canvas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowCanvas {
    pub nodes: Vec<Node>,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    node_type: String,
    #[serde(default)]
    position: Option<RawPosition>,
    #[serde(default)]
    parameters: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPosition {
    Pair([f64; 2]),
    Xy { x: f64, y: f64 },
}

impl RawPosition {
    fn point(&self) -> Point {
        match self {
            Self::Pair([x, y]) => Point::new(*x, *y),
            Self::Xy { x, y } => Point::new(*x, *y),
        }
    }
}

/// Parse a workflow definition into canvas entities.
///
/// Accepts a bare `{"nodes": [...]}` document or one wrapped in up to two
/// `workflow` envelopes, as marketplace APIs return it.
pub fn parse_workflow(json: &str) -> Result<WorkflowCanvas> {
    let root: Value = serde_json::from_str(json)
        .map_err(|e| FlowLensError::parse(format!("workflow JSON: {e}")))?;

    let nodes_value = locate_nodes(&root)
        .ok_or_else(|| FlowLensError::parse("workflow JSON has no `nodes` array"))?;

    let raw_nodes: Vec<RawNode> = serde_json::from_value(nodes_value.clone())
        .map_err(|e| FlowLensError::parse(format!("workflow nodes: {e}")))?;

    let mut canvas = WorkflowCanvas::default();
    for (index, raw) in raw_nodes.into_iter().enumerate() {
        let id = match &raw.id {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => format!("node-{index}"),
        };
        let point = raw.position.as_ref().map(RawPosition::point).unwrap_or_default();

        if raw.node_type.to_lowercase().contains(STICKY_NOTE_MARKER) {
            let content = raw
                .parameters
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let title = markdown_heading(&content).unwrap_or_else(|| raw.name.clone());
            canvas.annotations.push(Annotation {
                id,
                title,
                content,
                position: AnnotationBox {
                    x: point.x,
                    y: point.y,
                    width: raw.parameters.get("width").and_then(Value::as_f64),
                    height: raw.parameters.get("height").and_then(Value::as_f64),
                },
            });
        } else {
            canvas.nodes.push(Node {
                id,
                name: raw.name,
                node_type: raw.node_type,
                position: point,
            });
        }
    }

    debug!(
        nodes = canvas.nodes.len(),
        annotations = canvas.annotations.len(),
        "parsed workflow definition"
    );

    Ok(canvas)
}

fn locate_nodes(root: &Value) -> Option<&Value> {
    let mut current = root;
    for _ in 0..3 {
        if let Some(nodes) = current.get("nodes").filter(|n| n.is_array()) {
            return Some(nodes);
        }
        current = current.get("workflow")?;
    }
    None
}

/// First Markdown heading of a note, without the `#` markers.
fn markdown_heading(content: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .filter(|title| !title.is_empty())
}

/// Find a workflow definition embedded in rendered markup.
///
/// Looks at the `workflow` attribute of `<n8n-demo>` elements and at any
/// `data-workflow` attribute. Percent-encoded payloads are decoded.
pub fn find_workflow_json(markup: &str) -> Option<String> {
    let doc = Html::parse_document(markup);
    let sel = Selector::parse("n8n-demo[workflow], [data-workflow]").unwrap();

    doc.select(&sel).find_map(|el| {
        let raw = el
            .value()
            .attr("workflow")
            .or_else(|| el.value().attr("data-workflow"))?
            .trim();
        if raw.starts_with('{') {
            return Some(raw.to_string());
        }
        let decoded = urlencoding::decode(raw).ok()?;
        decoded
            .trim_start()
            .starts_with('{')
            .then(|| decoded.into_owned())
    })
}

/// Locate and parse the authoritative canvas for a page.
///
/// Order: host-supplied JSON, then the host document, then frame markup.
/// Nothing found is [`FlowLensError::SurfaceNotFound`].
pub fn load_canvas(input: &PageInput) -> Result<WorkflowCanvas> {
    if let Some(json) = &input.workflow_json {
        return parse_workflow(json);
    }

    let embedded = find_workflow_json(&input.host_markup).or_else(|| {
        input
            .frames
            .iter()
            .filter_map(|f| f.markup.as_deref())
            .find_map(find_workflow_json)
    });

    match embedded {
        Some(json) => parse_workflow(&json),
        None => Err(FlowLensError::surface_not_found(
            "no workflow definition supplied or embedded in the page",
        )),
    }
}
