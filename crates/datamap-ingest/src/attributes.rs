//! Attribute extraction: header row → variables, tag row → HXL tags.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::grid::read_grid;
use crate::ParseError;

/// Character that marks a cell as an HXL tag.
pub const TAG_SIGIL: char = '#';

/// The two kinds of attribute a dataset is compared on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Tag,
    Variable,
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag => f.write_str("tag"),
            Self::Variable => f.write_str("variable"),
        }
    }
}

/// Normalized attributes of one dataset, in source column order.
///
/// Duplicates are kept; comparisons treat each list as a set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetAttributes {
    pub variables: Vec<String>,
    pub hxl_tags: Vec<String>,
}

impl DatasetAttributes {
    pub fn of_kind(&self, kind: AttributeKind) -> &[String] {
        match kind {
            AttributeKind::Tag => &self.hxl_tags,
            AttributeKind::Variable => &self.variables,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.hxl_tags.is_empty()
    }
}

/// Lower-case a cell and drop all whitespace.
///
/// Returns `None` for cells that are empty after normalization or that spell a
/// missing value (`nan`, any case).
pub fn normalize_cell(raw: &str) -> Option<String> {
    let normalized: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    if normalized.is_empty() || normalized == "nan" {
        None
    } else {
        Some(normalized)
    }
}

/// Build attributes from an already-read header row and tag row.
///
/// Tag-row cells without the sigil are dropped, so a second header-like row
/// never masquerades as tags.
pub fn attributes_from_rows(header: &[String], tag_row: &[String]) -> DatasetAttributes {
    let variables = header.iter().filter_map(|c| normalize_cell(c)).collect();
    let hxl_tags = tag_row
        .iter()
        .filter_map(|c| normalize_cell(c))
        .filter(|c| c.contains(TAG_SIGIL))
        .collect();
    DatasetAttributes {
        variables,
        hxl_tags,
    }
}

/// Extract attributes from raw resource bytes; `name` selects the parser.
pub fn extract_attributes(name: &str, bytes: &[u8]) -> Result<DatasetAttributes, ParseError> {
    let rows = read_grid(name, bytes, 2)?;
    if rows.len() < 2 {
        return Err(ParseError::TooFewRows {
            resource: name.to_string(),
            rows: rows.len(),
        });
    }
    Ok(attributes_from_rows(&rows[0], &rows[1]))
}

/// Extract attributes from a file on disk.
pub fn extract_from_path(path: &Path) -> Result<DatasetAttributes, ParseError> {
    let bytes = std::fs::read(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    extract_attributes(&name, &bytes)
}
