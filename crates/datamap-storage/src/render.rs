//! Render seam: turns a graph into a viewable artifact at a given path.
//!
//! The store treats a renderer as a pure function of the graph. It picks the
//! destination next to the snapshot and never inspects the artifact.

use std::path::{Path, PathBuf};

use datamap_graph::SimilarityGraph;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("could not write `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not render graph: {0}")]
    Encode(String),
}

pub trait GraphRenderer {
    /// File extension of the produced artifact, without the dot.
    fn extension(&self) -> &'static str;

    /// Write the artifact for `graph` to `destination` and return its path.
    fn render(&self, graph: &SimilarityGraph, destination: &Path) -> Result<PathBuf, RenderError>;
}

impl<R: GraphRenderer + ?Sized> GraphRenderer for &R {
    fn extension(&self) -> &'static str {
        (**self).extension()
    }

    fn render(&self, graph: &SimilarityGraph, destination: &Path) -> Result<PathBuf, RenderError> {
        (**self).render(graph, destination)
    }
}

/// Write `contents` to `path`, mapping failures to [`RenderError::Io`].
pub fn write_artifact(path: &Path, contents: impl AsRef<[u8]>) -> Result<PathBuf, RenderError> {
    std::fs::write(path, contents).map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(path.to_path_buf())
}
