//! JSON snapshot envelope.
//!
//! ```json
//! { "format": "datamap-graph", "version": 1, "created_at": "...",
//!   "digest": "sha256:<hex>", "graph": { "nodes": [...], "edges": [...] } }
//! ```
//!
//! The digest covers the canonical serialization of `graph`, so a hand-edited
//! or truncated body is rejected instead of silently loaded.

use std::path::Path;

use chrono::{DateTime, Utc};
use datamap_graph::{DatasetNode, SimilarityEdge, SimilarityGraph};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{GraphLoadError, SnapshotWriteError};

pub const FORMAT_TAG: &str = "datamap-graph";
pub const FORMAT_VERSION: u32 = 1;
pub const DIGEST_PREFIX: &str = "sha256:";

#[derive(Debug, Serialize, Deserialize)]
struct GraphBody {
    nodes: Vec<DatasetNode>,
    edges: Vec<SimilarityEdge>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDocument {
    format: String,
    version: u32,
    created_at: DateTime<Utc>,
    digest: String,
    graph: GraphBody,
}

fn body_digest(body: &GraphBody) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_vec(body)?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    let hex: String = hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    Ok(format!("{DIGEST_PREFIX}{hex}"))
}

pub fn encode(graph: &SimilarityGraph, created_at: DateTime<Utc>) -> Result<String, SnapshotWriteError> {
    let graph = GraphBody {
        nodes: graph.nodes().cloned().collect(),
        edges: graph.edges().cloned().collect(),
    };
    let encode_err = |e: serde_json::Error| SnapshotWriteError::Encode(e.to_string());
    let doc = SnapshotDocument {
        format: FORMAT_TAG.to_string(),
        version: FORMAT_VERSION,
        created_at,
        digest: body_digest(&graph).map_err(encode_err)?,
        graph,
    };
    serde_json::to_string_pretty(&doc).map_err(encode_err)
}

pub fn decode(text: &str, path: &Path) -> Result<SimilarityGraph, GraphLoadError> {
    let doc: SnapshotDocument =
        serde_json::from_str(text).map_err(|e| GraphLoadError::corrupt(path, e))?;
    if doc.format != FORMAT_TAG {
        return Err(GraphLoadError::corrupt(
            path,
            format!("unexpected format tag `{}`", doc.format),
        ));
    }
    if doc.version > FORMAT_VERSION {
        return Err(GraphLoadError::corrupt(
            path,
            format!(
                "snapshot version {} is newer than supported version {FORMAT_VERSION}",
                doc.version
            ),
        ));
    }

    let actual = body_digest(&doc.graph).map_err(|e| GraphLoadError::corrupt(path, e))?;
    if actual != doc.digest {
        return Err(GraphLoadError::DigestMismatch {
            path: path.to_path_buf(),
            expected: doc.digest,
            actual,
        });
    }

    SimilarityGraph::from_parts(doc.graph.nodes, doc.graph.edges)
        .map_err(|e| GraphLoadError::corrupt(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use datamap_ingest::DatasetAttributes;

    fn graph() -> SimilarityGraph {
        let attrs = DatasetAttributes {
            variables: vec!["province".into()],
            hxl_tags: vec!["#adm1".into()],
        };
        let mut g = SimilarityGraph::new();
        g.add_node(DatasetNode::new(0, "a", attrs.clone())).unwrap();
        g.add_node(DatasetNode::new(2, "b", attrs).with_color("#F37464"))
            .unwrap();
        g.add_edge(SimilarityEdge {
            source: 0,
            target: 2,
            weight: 1.0,
            shared_count: 2,
            tag_proportion: 1.0,
            variable_proportion: 1.0,
            label: "#adm1, province".into(),
            color: None,
        })
        .unwrap();
        g
    }

    #[test]
    fn envelope_carries_format_and_digest() {
        let text = encode(&graph(), Utc::now()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["format"], FORMAT_TAG);
        assert_eq!(value["version"], FORMAT_VERSION);
        assert!(value["digest"].as_str().unwrap().starts_with(DIGEST_PREFIX));
        assert_eq!(value["graph"]["nodes"][1]["color"], "#F37464");
        assert_eq!(value["graph"]["nodes"][0]["hxl_tags"][0], "#adm1");
    }

    #[test]
    fn tampered_body_fails_digest_check() {
        let text = encode(&graph(), Utc::now()).unwrap();
        let tampered = text.replace("\"weight\": 1.0", "\"weight\": 9.0");
        assert_ne!(text, tampered);
        let err = decode(&tampered, Path::new("g.json")).unwrap_err();
        assert!(matches!(err, GraphLoadError::DigestMismatch { .. }));
    }

    #[test]
    fn foreign_json_is_corrupt() {
        let err = decode("{\"nodes\": []}", Path::new("g.json")).unwrap_err();
        assert!(matches!(err, GraphLoadError::Corrupt { .. }));
    }
}
