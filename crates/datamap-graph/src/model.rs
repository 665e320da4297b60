//! Similarity graph data model.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use datamap_ingest::{AttributeKind, DatasetAttributes};
use serde::{Deserialize, Serialize};

/// Stable node key, unique within a graph.
pub type NodeId = u64;

/// One dataset in the graph.
///
/// Attributes are fixed once the node is added: the graph only ever hands out
/// shared references to its nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetNode {
    pub id: NodeId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(flatten)]
    pub attributes: DatasetAttributes,
}

impl DatasetNode {
    pub fn new(id: NodeId, title: impl Into<String>, attributes: DatasetAttributes) -> Self {
        Self {
            id,
            title: title.into(),
            color: None,
            attributes,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn variables(&self) -> &[String] {
        &self.attributes.variables
    }

    pub fn hxl_tags(&self) -> &[String] {
        &self.attributes.hxl_tags
    }
}

/// Undirected edge between two datasets that share attributes.
///
/// `source < target` always holds, so an unordered pair has exactly one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityEdge {
    pub source: NodeId,
    pub target: NodeId,
    /// Judged total importance of every shared attribute.
    pub weight: f64,
    /// Shared tags plus shared variables.
    pub shared_count: usize,
    pub tag_proportion: f64,
    pub variable_proportion: f64,
    /// Shared attribute names, tags first.
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl SimilarityEdge {
    /// Headline proportion: the larger of the two per-kind proportions.
    pub fn proportion(&self) -> f64 {
        self.tag_proportion.max(self.variable_proportion)
    }

    pub fn proportion_of(&self, kind: AttributeKind) -> f64 {
        match kind {
            AttributeKind::Tag => self.tag_proportion,
            AttributeKind::Variable => self.variable_proportion,
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(self.source, self.target)
    }

    /// The endpoint that is not `id`, if `id` is an endpoint.
    pub fn other(&self, id: NodeId) -> Option<NodeId> {
        if self.source == id {
            Some(self.target)
        } else if self.target == id {
            Some(self.source)
        } else {
            None
        }
    }
}

/// Normalized unordered node pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey(NodeId, NodeId);

impl EdgeKey {
    pub fn new(a: NodeId, b: NodeId) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    pub fn low(&self) -> NodeId {
        self.0
    }

    pub fn high(&self) -> NodeId {
        self.1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("node {0} already exists")]
    DuplicateNode(NodeId),

    #[error("edge references unknown node {0}")]
    UnknownNode(NodeId),

    #[error("self-loop on node {0}")]
    SelfLoop(NodeId),

    #[error("duplicate edge ({0}, {1})")]
    DuplicateEdge(NodeId, NodeId),

    #[error("no node id left after {}", NodeId::MAX)]
    IdSpaceExhausted,
}

/// Undirected weighted graph of datasets. No self-loops, one edge per pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimilarityGraph {
    nodes: BTreeMap<NodeId, DatasetNode>,
    edges: BTreeMap<EdgeKey, SimilarityEdge>,
}

impl SimilarityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a graph from stored nodes and edges, enforcing the same
    /// invariants as incremental construction.
    pub fn from_parts(
        nodes: impl IntoIterator<Item = DatasetNode>,
        edges: impl IntoIterator<Item = SimilarityEdge>,
    ) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        for node in nodes {
            graph.add_node(node)?;
        }
        for edge in edges {
            graph.add_edge(edge)?;
        }
        Ok(graph)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &DatasetNode> {
        self.nodes.values()
    }

    /// Edges in ascending `(source, target)` order.
    pub fn edges(&self) -> impl Iterator<Item = &SimilarityEdge> {
        self.edges.values()
    }

    pub fn node(&self, id: NodeId) -> Option<&DatasetNode> {
        self.nodes.get(&id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn edge(&self, a: NodeId, b: NodeId) -> Option<&SimilarityEdge> {
        self.edges.get(&EdgeKey::new(a, b))
    }

    pub fn has_edge(&self, a: NodeId, b: NodeId) -> bool {
        self.edges.contains_key(&EdgeKey::new(a, b))
    }

    /// One past the current maximum id; fails once the maximum is `NodeId::MAX`.
    pub fn next_node_id(&self) -> Result<NodeId, GraphError> {
        match self.nodes.keys().next_back() {
            None => Ok(0),
            Some(max) => max.checked_add(1).ok_or(GraphError::IdSpaceExhausted),
        }
    }

    pub fn add_node(&mut self, node: DatasetNode) -> Result<(), GraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        self.nodes.insert(node.id, node);
        Ok(())
    }

    /// Insert an edge, normalizing its endpoint order.
    pub fn add_edge(&mut self, mut edge: SimilarityEdge) -> Result<(), GraphError> {
        if edge.source == edge.target {
            return Err(GraphError::SelfLoop(edge.source));
        }
        for id in [edge.source, edge.target] {
            if !self.nodes.contains_key(&id) {
                return Err(GraphError::UnknownNode(id));
            }
        }
        let key = edge.key();
        if self.edges.contains_key(&key) {
            return Err(GraphError::DuplicateEdge(key.low(), key.high()));
        }
        edge.source = key.low();
        edge.target = key.high();
        self.edges.insert(key, edge);
        Ok(())
    }

    /// Edges touching `id`.
    pub fn incident_edges(&self, id: NodeId) -> impl Iterator<Item = &SimilarityEdge> {
        self.edges
            .values()
            .filter(move |e| e.source == id || e.target == id)
    }

    /// Neighbours of `id`, heaviest edge first (ties by id).
    pub fn neighbors(&self, id: NodeId) -> Vec<(NodeId, f64)> {
        let mut out: Vec<(NodeId, f64)> = self
            .incident_edges(id)
            .filter_map(|e| e.other(id).map(|other| (other, e.weight)))
            .collect();
        out.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        out
    }

    /// In how many datasets each attribute of `kind` occurs, most common first.
    pub fn attribute_frequencies(&self, kind: AttributeKind) -> Vec<(String, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for node in self.nodes.values() {
            let distinct: BTreeSet<&str> = node
                .attributes
                .of_kind(kind)
                .iter()
                .map(String::as_str)
                .collect();
            for attr in distinct {
                *counts.entry(attr).or_default() += 1;
            }
        }
        let mut out: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(attr, n)| (attr.to_string(), n))
            .collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out
    }

    /// Sum of all edge weights.
    pub fn total_weight(&self) -> f64 {
        self.edges.values().map(|e| e.weight).sum()
    }
}
