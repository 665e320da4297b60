//! Tabular resource ingestion for datamap.
//!
//! Turns a tabular resource (comma-delimited text or a spreadsheet workbook)
//! into the two attribute sets the similarity graph compares:
//!
//! - **variables**: the header row (row 0),
//! - **HXL tags**: the tag row (row 1), keeping only cells that carry the `#` sigil.
//!
//! Parsing is untrusted: every failure is a [`ParseError`] naming the offending
//! resource, and callers decide whether to skip (batch) or abort (insertion).

pub mod attributes;
pub mod grid;
pub mod scan;

use std::path::PathBuf;

pub use attributes::{
    attributes_from_rows, extract_attributes, extract_from_path, normalize_cell,
    AttributeKind, DatasetAttributes, TAG_SIGIL,
};
pub use grid::{read_grid, TabularFormat};
pub use scan::{scan_resources, ResourceRef, ResourceScanOptions, ScanError};

/// Failure to turn a resource into a grid of cells.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unsupported resource type for `{resource}` (expected csv, xls or xlsx)")]
    UnsupportedType { resource: String },

    #[error("could not decode `{resource}`: {message}")]
    Decode { resource: String, message: String },

    #[error("`{resource}` has {rows} row(s); need a header row and a tag row")]
    TooFewRows { resource: String, rows: usize },

    #[error("could not read `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ParseError {
    /// Identifier of the resource that failed, for logs and reports.
    pub fn resource(&self) -> String {
        match self {
            Self::UnsupportedType { resource }
            | Self::Decode { resource, .. }
            | Self::TooFewRows { resource, .. } => resource.clone(),
            Self::Io { path, .. } => path.display().to_string(),
        }
    }
}
