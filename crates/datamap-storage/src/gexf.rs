//! GEXF 1.2 snapshots.
//!
//! Node attributes: `title`, `color`, `hxls` and `variables` (comma-joined).
//! Edge attributes: native `weight`, plus `title` (label), `prop`, `tag_prop`,
//! `var_prop`, `count` and `color`.
//!
//! The reader resolves `attvalue` references through the declared attribute
//! titles, so files written by other GEXF producers load as long as they use
//! the same attribute titles.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use datamap_graph::{DatasetNode, SimilarityEdge, SimilarityGraph};
use datamap_ingest::DatasetAttributes;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::{GraphLoadError, SnapshotWriteError};

pub const GEXF_NAMESPACE: &str = "http://gexf.net/1.2";

const NODE_ATTRIBUTES: [(&str, &str); 4] = [
    ("title", "string"),
    ("color", "string"),
    ("hxls", "string"),
    ("variables", "string"),
];

const EDGE_ATTRIBUTES: [(&str, &str); 6] = [
    ("title", "string"),
    ("prop", "double"),
    ("tag_prop", "double"),
    ("var_prop", "double"),
    ("count", "long"),
    ("color", "string"),
];

// ============================================================================
// Writing
// ============================================================================

struct GexfWriter {
    inner: Writer<Vec<u8>>,
}

impl GexfWriter {
    fn emit(&mut self, event: Event<'_>) -> Result<(), SnapshotWriteError> {
        self.inner
            .write_event(event)
            .map_err(|e| SnapshotWriteError::Encode(e.to_string()))
    }

    fn element<'a>(name: &'a str, attrs: &[(&'a str, &'a str)]) -> BytesStart<'a> {
        let mut start = BytesStart::new(name);
        for &attr in attrs {
            start.push_attribute(attr);
        }
        start
    }

    fn open(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), SnapshotWriteError> {
        self.emit(Event::Start(Self::element(name, attrs)))
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), SnapshotWriteError> {
        self.emit(Event::Empty(Self::element(name, attrs)))
    }

    fn close(&mut self, name: &str) -> Result<(), SnapshotWriteError> {
        self.emit(Event::End(BytesEnd::new(name)))
    }

    fn declare(&mut self, class: &str, attributes: &[(&str, &str)]) -> Result<(), SnapshotWriteError> {
        self.open("attributes", &[("class", class), ("mode", "static")])?;
        for (id, (title, kind)) in attributes.iter().enumerate() {
            let id = id.to_string();
            self.empty("attribute", &[("id", id.as_str()), ("title", *title), ("type", *kind)])?;
        }
        self.close("attributes")
    }

    /// `values` are `(attribute index, value)` pairs.
    fn attvalues(&mut self, values: &[(usize, String)]) -> Result<(), SnapshotWriteError> {
        if values.is_empty() {
            return Ok(());
        }
        self.open("attvalues", &[])?;
        for (idx, value) in values {
            let idx = idx.to_string();
            self.empty("attvalue", &[("for", idx.as_str()), ("value", value.as_str())])?;
        }
        self.close("attvalues")
    }
}

fn node_values(node: &DatasetNode) -> Vec<(usize, String)> {
    let mut values = vec![(0, node.title.clone())];
    if let Some(color) = &node.color {
        values.push((1, color.clone()));
    }
    values.push((2, node.hxl_tags().join(",")));
    values.push((3, node.variables().join(",")));
    values
}

fn edge_values(edge: &SimilarityEdge) -> Vec<(usize, String)> {
    let mut values = vec![
        (0, edge.label.clone()),
        (1, edge.proportion().to_string()),
        (2, edge.tag_proportion.to_string()),
        (3, edge.variable_proportion.to_string()),
        (4, edge.shared_count.to_string()),
    ];
    if let Some(color) = &edge.color {
        values.push((5, color.clone()));
    }
    values
}

pub fn encode(graph: &SimilarityGraph, created_at: DateTime<Utc>) -> Result<String, SnapshotWriteError> {
    let mut w = GexfWriter {
        inner: Writer::new_with_indent(Vec::new(), b' ', 2),
    };
    w.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    w.open("gexf", &[("xmlns", GEXF_NAMESPACE), ("version", "1.2")])?;

    let modified = created_at.format("%Y-%m-%d").to_string();
    w.open("meta", &[("lastmodifieddate", modified.as_str())])?;
    w.open("creator", &[])?;
    w.emit(Event::Text(BytesText::new("datamap")))?;
    w.close("creator")?;
    w.close("meta")?;

    w.open("graph", &[("defaultedgetype", "undirected"), ("mode", "static")])?;
    w.declare("node", &NODE_ATTRIBUTES)?;
    w.declare("edge", &EDGE_ATTRIBUTES)?;

    w.open("nodes", &[])?;
    for node in graph.nodes() {
        let id = node.id.to_string();
        w.open("node", &[("id", id.as_str()), ("label", node.title.as_str())])?;
        w.attvalues(&node_values(node))?;
        w.close("node")?;
    }
    w.close("nodes")?;

    w.open("edges", &[])?;
    for (idx, edge) in graph.edges().enumerate() {
        let id = idx.to_string();
        let source = edge.source.to_string();
        let target = edge.target.to_string();
        let weight = edge.weight.to_string();
        w.open(
            "edge",
            &[
                ("id", id.as_str()),
                ("source", source.as_str()),
                ("target", target.as_str()),
                ("weight", weight.as_str()),
            ],
        )?;
        w.attvalues(&edge_values(edge))?;
        w.close("edge")?;
    }
    w.close("edges")?;

    w.close("graph")?;
    w.close("gexf")?;

    String::from_utf8(w.inner.into_inner()).map_err(|e| SnapshotWriteError::Encode(e.to_string()))
}

// ============================================================================
// Reading
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Node,
    Edge,
}

#[derive(Debug)]
struct Element {
    class: Class,
    attrs: HashMap<String, String>,
    /// attvalues keyed by attribute title.
    values: HashMap<String, String>,
}

#[derive(Default)]
struct GexfParser {
    declaring: Option<Class>,
    node_titles: HashMap<String, String>,
    edge_titles: HashMap<String, String>,
    open: Option<Element>,
    nodes: Vec<DatasetNode>,
    edges: Vec<SimilarityEdge>,
}

fn attributes_of(e: &BytesStart<'_>) -> Result<HashMap<String, String>, String> {
    let mut out = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = String::from_utf8_lossy(&attr.value);
        let value = unescape(&raw).map_err(|err| err.to_string())?;
        out.insert(key, value.into_owned());
    }
    Ok(out)
}

fn split_joined(value: Option<&String>) -> Vec<String> {
    match value {
        Some(v) if !v.is_empty() => v.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

fn parse_field<T: std::str::FromStr>(
    map: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>, String> {
    map.get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| format!("invalid `{key}` value `{raw}`"))
        })
        .transpose()
}

impl GexfParser {
    fn start(&mut self, e: &BytesStart<'_>, self_closing: bool) -> Result<(), String> {
        match e.name().as_ref() {
            b"attributes" => {
                let attrs = attributes_of(e)?;
                self.declaring = match attrs.get("class").map(String::as_str) {
                    Some("node") => Some(Class::Node),
                    Some("edge") => Some(Class::Edge),
                    _ => None,
                };
                if self_closing {
                    self.declaring = None;
                }
            }
            b"attribute" => {
                let attrs = attributes_of(e)?;
                if let (Some(id), Some(title)) = (attrs.get("id"), attrs.get("title")) {
                    let titles = match self.declaring {
                        Some(Class::Node) => &mut self.node_titles,
                        Some(Class::Edge) => &mut self.edge_titles,
                        None => return Ok(()),
                    };
                    titles.insert(id.clone(), title.clone());
                }
            }
            name @ (b"node" | b"edge") => {
                let class = if name == b"node" { Class::Node } else { Class::Edge };
                self.open = Some(Element {
                    class,
                    attrs: attributes_of(e)?,
                    values: HashMap::new(),
                });
                if self_closing {
                    self.finish()?;
                }
            }
            b"attvalue" => {
                let attrs = attributes_of(e)?;
                if let Some(element) = self.open.as_mut() {
                    let titles = match element.class {
                        Class::Node => &self.node_titles,
                        Class::Edge => &self.edge_titles,
                    };
                    if let (Some(key), Some(value)) = (attrs.get("for"), attrs.get("value")) {
                        let title = titles.get(key).cloned().unwrap_or_else(|| key.clone());
                        element.values.insert(title, value.clone());
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, name: &[u8]) -> Result<(), String> {
        match name {
            b"attributes" => self.declaring = None,
            b"node" | b"edge" => self.finish()?,
            _ => {}
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), String> {
        let Some(element) = self.open.take() else {
            return Ok(());
        };
        match element.class {
            Class::Node => self.nodes.push(node_from(&element)?),
            Class::Edge => self.edges.push(edge_from(&element)?),
        }
        Ok(())
    }
}

fn node_from(element: &Element) -> Result<DatasetNode, String> {
    let id = parse_field(&element.attrs, "id")?.ok_or("node without id")?;
    let title = element
        .values
        .get("title")
        .or_else(|| element.attrs.get("label"))
        .cloned()
        .unwrap_or_default();
    let attributes = DatasetAttributes {
        variables: split_joined(element.values.get("variables")),
        hxl_tags: split_joined(element.values.get("hxls")),
    };
    Ok(DatasetNode {
        id,
        title,
        color: element.values.get("color").cloned(),
        attributes,
    })
}

fn edge_from(element: &Element) -> Result<SimilarityEdge, String> {
    let source = parse_field(&element.attrs, "source")?.ok_or("edge without source")?;
    let target = parse_field(&element.attrs, "target")?.ok_or("edge without target")?;
    // GEXF's implicit edge weight.
    let weight = parse_field(&element.attrs, "weight")?.unwrap_or(1.0);

    let values = &element.values;
    let prop: Option<f64> = parse_field(values, "prop")?;
    let tag_prop: Option<f64> = parse_field(values, "tag_prop")?;
    let var_prop: Option<f64> = parse_field(values, "var_prop")?;
    let (tag_proportion, variable_proportion) = match (tag_prop, var_prop) {
        (None, None) => {
            let p = prop.unwrap_or(0.0);
            (p, p)
        }
        (t, v) => (t.unwrap_or(0.0), v.unwrap_or(0.0)),
    };

    Ok(SimilarityEdge {
        source,
        target,
        weight,
        shared_count: parse_field(values, "count")?.unwrap_or(0),
        tag_proportion,
        variable_proportion,
        label: values.get("title").cloned().unwrap_or_default(),
        color: values.get("color").cloned(),
    })
}

pub fn decode(text: &str, path: &Path) -> Result<SimilarityGraph, GraphLoadError> {
    let mut reader = Reader::from_str(text);
    let mut parser = GexfParser::default();
    let mut saw_root = false;
    let mut closed_root = false;

    loop {
        let step = match reader.read_event() {
            Err(e) => Err(e.to_string()),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                saw_root |= e.name().as_ref() == b"gexf";
                parser.start(&e, false)
            }
            Ok(Event::Empty(e)) => parser.start(&e, true),
            Ok(Event::End(e)) => {
                closed_root |= e.name().as_ref() == b"gexf";
                parser.end(e.name().as_ref())
            }
            Ok(_) => Ok(()),
        };
        step.map_err(|message| GraphLoadError::corrupt(path, message))?;
    }

    if !saw_root {
        return Err(GraphLoadError::corrupt(path, "missing <gexf> root element"));
    }
    if !closed_root || parser.open.is_some() {
        return Err(GraphLoadError::corrupt(path, "document ends inside an element"));
    }
    SimilarityGraph::from_parts(parser.nodes, parser.edges)
        .map_err(|e| GraphLoadError::corrupt(path, e))
}
