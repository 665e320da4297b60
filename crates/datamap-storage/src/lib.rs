//! Durable snapshots of the dataset similarity graph.
//!
//! ```text
//!   batch build ──► <name>.json ────────────────┐
//!                                               ▼
//!   upload ──► load latest ──► insert ──► <name>-updated-<ts>.json ──► render
//! ```
//!
//! Snapshots are append-only: a batch build writes the base snapshot, every
//! insertion writes a new, uniquely named one and never touches its input.
//! Old snapshots are never deleted here; a new batch build moves the previous
//! generation's insertion snapshots under `archive/`.
//!
//! Two on-disk formats are supported, chosen by extension:
//!
//! - **JSON** (`.json`, default): versioned envelope with a SHA-256 digest of
//!   the graph body, checked on load.
//! - **GEXF 1.2** (`.gexf`): the attribute-preserving XML format Gephi and
//!   networkx read.

pub mod gexf;
pub mod insert;
pub mod json;
pub mod render;
pub mod store;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use datamap_graph::SimilarityGraph;
use serde::{Deserialize, Serialize};

pub use insert::{insert_dataset, InsertError, InsertRequest, InsertionReport};
pub use render::{GraphRenderer, RenderError};
pub use store::{SnapshotStore, StoreConfig};

// ============================================================================
// Errors
// ============================================================================

/// A persisted graph could not be loaded. Always fatal for the operation.
#[derive(Debug, thiserror::Error)]
pub enum GraphLoadError {
    #[error("graph snapshot `{}` does not exist", .0.display())]
    Missing(PathBuf),

    #[error("no graph snapshot named `{name}` in `{}`", dir.display())]
    NoSnapshots { dir: PathBuf, name: String },

    #[error("could not read `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("graph snapshot `{}` is corrupt: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },

    #[error("graph snapshot `{}` digest mismatch: recorded {expected}, computed {actual}", path.display())]
    DigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("`{}` is not a graph snapshot (expected .json or .gexf)", .0.display())]
    UnsupportedFormat(PathBuf),
}

impl GraphLoadError {
    pub(crate) fn corrupt(path: &Path, message: impl ToString) -> Self {
        Self::Corrupt {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotWriteError {
    #[error("could not write `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not encode graph snapshot: {0}")]
    Encode(String),
}

// ============================================================================
// Formats
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    #[default]
    Json,
    Gexf,
}

impl SnapshotFormat {
    pub const ALL: [SnapshotFormat; 2] = [SnapshotFormat::Json, SnapshotFormat::Gexf];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Gexf => "gexf",
        }
    }

    /// Format implied by a path's extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        Self::ALL.into_iter().find(|f| f.extension() == ext)
    }

    pub fn encode(
        self,
        graph: &SimilarityGraph,
        created_at: DateTime<Utc>,
    ) -> Result<String, SnapshotWriteError> {
        match self {
            Self::Json => json::encode(graph, created_at),
            Self::Gexf => gexf::encode(graph, created_at),
        }
    }

    /// Decode snapshot text; `path` is only used in error reports.
    pub fn decode(self, text: &str, path: &Path) -> Result<SimilarityGraph, GraphLoadError> {
        match self {
            Self::Json => json::decode(text, path),
            Self::Gexf => gexf::decode(text, path),
        }
    }
}

impl FromStr for SnapshotFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "gexf" => Ok(Self::Gexf),
            other => Err(format!("unknown snapshot format `{other}` (expected json or gexf)")),
        }
    }
}

/// Read a snapshot file, picking the format from its extension.
pub fn load_graph(path: &Path) -> Result<SimilarityGraph, GraphLoadError> {
    let format = SnapshotFormat::from_path(path)
        .ok_or_else(|| GraphLoadError::UnsupportedFormat(path.to_path_buf()))?;
    if !path.is_file() {
        return Err(GraphLoadError::Missing(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path).map_err(|source| GraphLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let graph = format.decode(&text, path)?;
    tracing::info!(
        path = %path.display(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "loaded graph snapshot"
    );
    Ok(graph)
}

/// Write `graph` to `path` in the format implied by its extension, replacing
/// any existing file.
pub fn save_graph(graph: &SimilarityGraph, path: &Path) -> Result<(), SnapshotWriteError> {
    let format = SnapshotFormat::from_path(path).ok_or_else(|| {
        SnapshotWriteError::Encode(format!(
            "`{}` has no snapshot extension (expected .json or .gexf)",
            path.display()
        ))
    })?;
    let text = format.encode(graph, Utc::now())?;
    std::fs::write(path, text).map_err(|source| SnapshotWriteError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), "wrote graph snapshot");
    Ok(())
}
