//! Dataset similarity graph.
//!
//! Nodes are datasets; an undirected edge joins two datasets that share at
//! least one HXL tag or variable. Edge weight is the judged importance of the
//! shared attributes (see [`weights`]), merged across both attribute kinds
//! into a single edge per pair.
//!
//! Two ways to grow a graph:
//!
//! - [`builder::build_graph`]: every resource of a collection, compared
//!   pairwise in one pass,
//! - [`inserter::insert_candidate`]: one new dataset added to an existing graph,
//!   with a [`inserter::ConnectivitySummary`] of what it connected to.

pub mod builder;
pub mod inserter;
pub mod model;
pub mod overlap;
pub mod weights;

pub use builder::{build_graph, BatchBuilder, BatchOutcome, SkippedResource};
pub use inserter::{
    connections_for, insert_candidate, Candidate, Connection, ConnectivitySummary, Insertion,
    CANDIDATE_COLOR,
};
pub use model::{DatasetNode, EdgeKey, GraphError, NodeId, SimilarityEdge, SimilarityGraph};
pub use overlap::{compare, round2, weighted_intersection, KindOverlap, PairOverlap};
pub use weights::{
    WeightTable, WeightTableLoadError, WeightTables, Weighting, DEFAULT_WEIGHT,
    UNIFORM_EDGE_WEIGHT,
};
