//! Visualization of similarity graphs.
//!
//! Output formats:
//! - Interactive HTML page (vis-network), the default rendered asset
//! - Graphviz DOT (external layout tooling)
//! - JSON (for custom frontends)
//!
//! Node colour comes from the stored `color` attribute (inserted datasets are
//! highlighted), edge width from the edge weight.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use datamap_graph::SimilarityGraph;
use datamap_storage::render::write_artifact;
use datamap_storage::{GraphRenderer, RenderError};
use serde::Serialize;

const DEFAULT_NODE_COLOR: &str = "#97C2FC";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VizFormat {
    Dot,
    Html,
    Json,
}

impl VizFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dot" | "gv" => Ok(Self::Dot),
            "html" | "htm" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            other => Err(anyhow!(
                "unknown viz format `{other}` (expected dot|html|json)"
            )),
        }
    }

    /// Format implied by an output path, if any.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| Self::parse(e).ok())
    }
}

// =============================================================================
// View model
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct VizNode {
    pub id: u64,
    pub label: String,
    /// Hover HTML: escaped text, `<br>` separated.
    pub title: String,
    pub color: String,
    pub degree: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct VizEdge {
    pub from: u64,
    pub to: u64,
    pub value: f64,
    /// Hover HTML: escaped shared attributes, one per line.
    pub title: String,
    pub prop: f64,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VizGraph {
    pub nodes: Vec<VizNode>,
    pub edges: Vec<VizEdge>,
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Escaped pieces joined by `<br>`.
fn hover_html<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|p| html_escape(p.as_ref()))
        .collect::<Vec<_>>()
        .join("<br>")
}

pub fn viz_graph(graph: &SimilarityGraph) -> VizGraph {
    let nodes = graph
        .nodes()
        .map(|n| {
            let mut hover = vec![n.title.clone()];
            if !n.hxl_tags().is_empty() {
                hover.push(format!("tags: {}", n.hxl_tags().join(", ")));
            }
            if !n.variables().is_empty() {
                hover.push(format!("variables: {}", n.variables().join(", ")));
            }
            VizNode {
                id: n.id,
                label: n.title.clone(),
                title: hover_html(&hover),
                color: n.color.clone().unwrap_or_else(|| DEFAULT_NODE_COLOR.to_string()),
                degree: graph.incident_edges(n.id).count(),
            }
        })
        .collect();
    let edges = graph
        .edges()
        .map(|e| VizEdge {
            from: e.source,
            to: e.target,
            value: e.weight,
            title: hover_html(&e.label.split(", ").collect::<Vec<_>>()),
            prop: e.proportion(),
            count: e.shared_count,
            color: e.color.clone(),
        })
        .collect();
    VizGraph { nodes, edges }
}

// =============================================================================
// Renderers
// =============================================================================

pub fn render_dot(graph: &SimilarityGraph) -> String {
    fn dot_escape(s: &str) -> String {
        s.replace('\\', "\\\\").replace('"', "\\\"")
    }

    let mut out = String::new();
    out.push_str("graph datamap {\n");
    out.push_str("  layout=neato;\n  overlap=false;\n");
    out.push_str("  node [shape=ellipse, style=filled, fontname=\"Helvetica\"];\n");
    out.push_str("  edge [fontname=\"Helvetica\", fontsize=9];\n\n");

    for n in graph.nodes() {
        let color = n.color.as_deref().unwrap_or(DEFAULT_NODE_COLOR);
        out.push_str(&format!(
            "  n{} [label=\"{}\", fillcolor=\"{}\"];\n",
            n.id,
            dot_escape(&n.title),
            dot_escape(color)
        ));
    }
    if graph.edge_count() > 0 {
        out.push('\n');
    }
    for e in graph.edges() {
        let mut attrs = vec![
            format!("label=\"{}\"", dot_escape(&e.label)),
            format!("weight={}", e.weight),
            format!("penwidth={:.2}", 1.0 + e.weight.min(10.0)),
        ];
        if let Some(color) = &e.color {
            attrs.push(format!("color=\"{}\"", dot_escape(color)));
        }
        out.push_str(&format!(
            "  n{} -- n{} [{}];\n",
            e.source,
            e.target,
            attrs.join(", ")
        ));
    }
    out.push_str("}\n");
    out
}

pub fn render_json(graph: &SimilarityGraph) -> Result<String> {
    Ok(serde_json::to_string_pretty(&viz_graph(graph))?)
}

pub fn render_html(graph: &SimilarityGraph) -> Result<String> {
    // `</` is escaped so graph data cannot close the `<script>` tag.
    let json = serde_json::to_string(&viz_graph(graph))?.replace("</", "<\\/");

    let template = include_str!("../templates/graph_explorer.html");
    let mut html = template.to_string();
    html = html.replace("{{GRAPH_JSON}}", &json);
    html = html.replace("{{NODES_COUNT}}", &graph.node_count().to_string());
    html = html.replace("{{EDGES_COUNT}}", &graph.edge_count().to_string());
    Ok(html)
}

pub fn render(graph: &SimilarityGraph, format: VizFormat) -> Result<String> {
    match format {
        VizFormat::Dot => Ok(render_dot(graph)),
        VizFormat::Html => render_html(graph),
        VizFormat::Json => render_json(graph),
    }
}

/// Renders the interactive page next to every written snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl GraphRenderer for HtmlRenderer {
    fn extension(&self) -> &'static str {
        "html"
    }

    fn render(&self, graph: &SimilarityGraph, destination: &Path) -> Result<PathBuf, RenderError> {
        let html = render_html(graph).map_err(|e| RenderError::Encode(e.to_string()))?;
        write_artifact(destination, html)
    }
}

// =============================================================================
// Tests
// =============================================================================
