//! Incremental insertion of one new dataset into an existing graph.
//!
//! The new dataset is held as a [`Candidate`] outside the graph while it is
//! compared against every existing node. Only once all comparisons are done is
//! it committed under a fresh id, together with its edges.

use datamap_ingest::DatasetAttributes;
use serde::{Deserialize, Serialize};

use crate::model::{DatasetNode, GraphError, NodeId, SimilarityGraph};
use crate::overlap::{compare, PairOverlap};
use crate::weights::Weighting;

/// Colour of an inserted dataset and of its edges in rendered output.
pub const CANDIDATE_COLOR: &str = "#F37464";

/// A dataset that is not part of the graph yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub title: String,
    pub attributes: DatasetAttributes,
}

impl Candidate {
    pub fn new(title: impl Into<String>, attributes: DatasetAttributes) -> Self {
        Self {
            title: title.into(),
            attributes,
        }
    }
}

/// An existing dataset the candidate shares attributes with.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub node: NodeId,
    pub title: String,
    pub overlap: PairOverlap,
}

/// Connectivity of an inserted dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectivitySummary {
    pub connected_datasets: usize,
    pub datasets_sharing_tags: usize,
    pub tags_shared: usize,
    pub datasets_sharing_variables: usize,
    pub variables_shared: usize,
    pub total_edge_weight: f64,
}

impl ConnectivitySummary {
    fn record(&mut self, overlap: &PairOverlap) {
        self.connected_datasets += 1;
        if !overlap.tags.is_empty() {
            self.datasets_sharing_tags += 1;
            self.tags_shared += overlap.tags.count();
        }
        if !overlap.variables.is_empty() {
            self.datasets_sharing_variables += 1;
            self.variables_shared += overlap.variables.count();
        }
        self.total_edge_weight += overlap.weight;
    }

    /// Mean number of shared tags over datasets that share at least one tag.
    pub fn average_tags_shared(&self) -> f64 {
        mean(self.tags_shared, self.datasets_sharing_tags)
    }

    /// Mean number of shared variables over datasets that share at least one.
    pub fn average_variables_shared(&self) -> f64 {
        mean(self.variables_shared, self.datasets_sharing_variables)
    }
}

fn mean(total: usize, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

/// What an insertion did to the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Insertion {
    pub node_id: NodeId,
    /// Connected datasets in ascending node-id order.
    pub connections: Vec<Connection>,
    pub summary: ConnectivitySummary,
}

impl Insertion {
    pub fn connected_titles(&self) -> Vec<String> {
        self.connections.iter().map(|c| c.title.clone()).collect()
    }
}

/// Compare `candidate` against every node of `graph` without modifying it.
pub fn connections_for(
    graph: &SimilarityGraph,
    candidate: &Candidate,
    weighting: &Weighting,
) -> (Vec<Connection>, ConnectivitySummary) {
    let mut summary = ConnectivitySummary::default();
    let mut connections = Vec::new();
    for node in graph.nodes() {
        let overlap = compare(&candidate.attributes, &node.attributes, weighting);
        if overlap.is_empty() {
            continue;
        }
        summary.record(&overlap);
        connections.push(Connection {
            node: node.id,
            title: node.title.clone(),
            overlap,
        });
    }
    (connections, summary)
}

/// Commit `candidate` to `graph` under a fresh id and connect it.
pub fn insert_candidate(
    graph: &mut SimilarityGraph,
    candidate: Candidate,
    weighting: &Weighting,
) -> Result<Insertion, GraphError> {
    let (connections, summary) = connections_for(graph, &candidate, weighting);

    let node_id = graph.next_node_id()?;
    graph.add_node(
        DatasetNode::new(node_id, candidate.title, candidate.attributes)
            .with_color(CANDIDATE_COLOR),
    )?;
    for connection in &connections {
        if let Some(mut edge) = connection.overlap.to_edge(connection.node, node_id) {
            edge.color = Some(CANDIDATE_COLOR.to_string());
            graph.add_edge(edge)?;
        }
    }

    tracing::info!(
        node = node_id,
        connected = summary.connected_datasets,
        total_weight = summary.total_edge_weight,
        "inserted dataset"
    );
    Ok(Insertion {
        node_id,
        connections,
        summary,
    })
}
