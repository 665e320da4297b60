//! Batch construction of a similarity graph from a list of resources.
//!
//! Each accepted resource is compared once against every node accepted before
//! it, so every unordered pair is visited exactly once and no pairwise
//! intersection is retained after its edge has been decided.

use datamap_ingest::{extract_from_path, DatasetAttributes, ParseError, ResourceRef};

use crate::model::{DatasetNode, GraphError, NodeId, SimilarityGraph};
use crate::overlap::compare;
use crate::weights::Weighting;

/// A resource that did not become a node.
#[derive(Debug)]
pub struct SkippedResource {
    pub index: usize,
    pub title: String,
    pub error: ParseError,
}

/// Result of a batch run.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub graph: SimilarityGraph,
    pub skipped: Vec<SkippedResource>,
}

/// Incremental state of a batch run. Nodes are appended one at a time and are
/// never revisited as the later node of a pair.
pub struct BatchBuilder<'w> {
    weighting: &'w Weighting,
    outcome: BatchOutcome,
}

impl<'w> BatchBuilder<'w> {
    pub fn new(weighting: &'w Weighting) -> Self {
        Self {
            weighting,
            outcome: BatchOutcome::default(),
        }
    }

    /// Add the resource at position `index`.
    ///
    /// An extraction failure is recorded and skipped; it never aborts the run.
    /// Returns whether a node was added.
    pub fn push(
        &mut self,
        index: usize,
        title: &str,
        extracted: Result<DatasetAttributes, ParseError>,
    ) -> Result<bool, GraphError> {
        let attributes = match extracted {
            Ok(attributes) => attributes,
            Err(error) => {
                tracing::warn!(
                    resource = %error.resource(),
                    index,
                    error = %error,
                    "skipping resource"
                );
                self.outcome.skipped.push(SkippedResource {
                    index,
                    title: title.to_string(),
                    error,
                });
                return Ok(false);
            }
        };

        let id = index as NodeId;
        let weighting = self.weighting;
        let graph = &mut self.outcome.graph;
        if graph.contains_node(id) {
            return Err(GraphError::DuplicateNode(id));
        }

        let edges: Vec<_> = graph
            .nodes()
            .filter_map(|earlier| {
                compare(&attributes, &earlier.attributes, weighting).to_edge(id, earlier.id)
            })
            .collect();

        tracing::debug!(
            index,
            title,
            variables = attributes.variables.len(),
            tags = attributes.hxl_tags.len(),
            edges = edges.len(),
            "added resource to graph"
        );
        graph.add_node(DatasetNode::new(id, title, attributes))?;
        for edge in edges {
            graph.add_edge(edge)?;
        }
        Ok(true)
    }

    pub fn finish(self) -> BatchOutcome {
        self.outcome
    }
}

/// Build a graph from `resources` in the given order, reading each from disk.
pub fn build_graph(resources: &[ResourceRef], weighting: &Weighting) -> Result<BatchOutcome, GraphError> {
    let mut builder = BatchBuilder::new(weighting);
    for resource in resources {
        tracing::info!(title = %resource.title, path = %resource.path.display(), "adding resource");
        builder.push(resource.index, &resource.title, extract_from_path(&resource.path))?;
    }
    let outcome = builder.finish();
    tracing::info!(
        nodes = outcome.graph.node_count(),
        edges = outcome.graph.edge_count(),
        skipped = outcome.skipped.len(),
        "batch graph built"
    );
    Ok(outcome)
}
