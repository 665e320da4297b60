//! Insertion pipeline: load the latest snapshot, add one uploaded dataset,
//! persist a new snapshot and render it.
//!
//! Failure ordering matters: the stored graph is loaded before the upload is
//! parsed, and nothing is written until both succeeded. A corrupt store or an
//! unreadable upload therefore leaves the snapshot directory untouched. A
//! trigger without content only looks up the latest snapshot's path.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use datamap_graph::{
    insert_candidate, Candidate, ConnectivitySummary, GraphError, NodeId, Weighting,
};
use datamap_ingest::{extract_attributes, ParseError};

use crate::render::{GraphRenderer, RenderError};
use crate::store::SnapshotStore;
use crate::{load_graph, GraphLoadError, SnapshotWriteError};

#[derive(Debug, thiserror::Error)]
pub enum InsertError {
    #[error(transparent)]
    Load(#[from] GraphLoadError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("inconsistent graph: {0}")]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Write(#[from] SnapshotWriteError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// One upload event.
#[derive(Debug, Clone)]
pub struct InsertRequest<'a> {
    /// Only used to pick the parser by suffix and as the node title.
    pub file_name: &'a str,
    /// `None` when the trigger carried no file.
    pub bytes: Option<&'a [u8]>,
    /// When the upload was received; reported, not used for naming.
    pub received_at: DateTime<Utc>,
}

impl<'a> InsertRequest<'a> {
    pub fn new(file_name: &'a str, bytes: &'a [u8]) -> Self {
        Self {
            file_name,
            bytes: Some(bytes),
            received_at: Utc::now(),
        }
    }

    /// A trigger without content.
    pub fn empty() -> Self {
        Self {
            file_name: "",
            bytes: None,
            received_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InsertionReport {
    /// Snapshot holding the result (the untouched latest one for a no-op).
    pub snapshot: PathBuf,
    /// Rendered artifact for `snapshot`, when one exists.
    pub asset: Option<PathBuf>,
    /// Id given to the inserted dataset; `None` for a no-op.
    pub node_id: Option<NodeId>,
    /// Titles of the connected datasets, in node-id order.
    pub connected: Vec<String>,
    pub summary: ConnectivitySummary,
}

/// Insert one dataset into the newest snapshot of `store` (or into `from`).
///
/// Writes a new snapshot and never modifies the one it read. When rendering
/// fails the new snapshot is withdrawn again, so an `Err` leaves the store as
/// it was.
pub fn insert_dataset(
    store: &SnapshotStore,
    from: Option<&Path>,
    request: &InsertRequest<'_>,
    weighting: &Weighting,
    renderer: &dyn GraphRenderer,
) -> Result<InsertionReport, InsertError> {
    let Some(bytes) = request.bytes else {
        return Ok(latest_reference(store, from, renderer)?);
    };

    let (source, mut graph) = match from {
        Some(path) => (path.to_path_buf(), load_graph(path)?),
        None => store.load_latest()?,
    };

    let attributes = extract_attributes(request.file_name, bytes).map_err(|err| {
        tracing::warn!(
            resource = %err.resource(),
            error = %err,
            "rejecting uploaded dataset"
        );
        err
    })?;

    tracing::info!(
        file = request.file_name,
        received_at = %request.received_at.to_rfc3339(),
        base = %source.display(),
        "inserting dataset"
    );
    let insertion = insert_candidate(
        &mut graph,
        Candidate::new(request.file_name, attributes),
        weighting,
    )?;

    let snapshot = store.write_snapshot(&graph, Utc::now())?;
    let asset = match store.render(&graph, &snapshot, renderer) {
        Ok(asset) => asset,
        Err(err) => {
            store.withdraw(&snapshot);
            return Err(err.into());
        }
    };

    Ok(InsertionReport {
        snapshot,
        asset: Some(asset),
        node_id: Some(insertion.node_id),
        connected: insertion.connected_titles(),
        summary: insertion.summary,
    })
}

/// The no-op answer: where the latest snapshot is. Nothing is decoded.
fn latest_reference(
    store: &SnapshotStore,
    from: Option<&Path>,
    renderer: &dyn GraphRenderer,
) -> Result<InsertionReport, GraphLoadError> {
    let source = match from {
        Some(path) if path.is_file() => path.to_path_buf(),
        Some(path) => return Err(GraphLoadError::Missing(path.to_path_buf())),
        None => store.latest_path()?,
    };
    tracing::info!(snapshot = %source.display(), "no dataset supplied; nothing to insert");
    let asset = store.asset_path(&source, renderer);
    Ok(InsertionReport {
        asset: asset.is_file().then_some(asset),
        snapshot: source,
        node_id: None,
        connected: Vec::new(),
        summary: ConnectivitySummary::default(),
    })
}
