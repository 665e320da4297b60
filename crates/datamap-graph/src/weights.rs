//! Expert-judgement weight tables.
//!
//! Each attribute kind has its own table mapping attribute name → importance.
//! Lookups never fail: attributes missing from a table weigh [`DEFAULT_WEIGHT`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use datamap_ingest::{normalize_cell, read_grid, AttributeKind, ParseError};

/// Contribution of an attribute that is absent from its weight table.
pub const DEFAULT_WEIGHT: f64 = 0.5;

/// Edge weight used when judged weighting is disabled.
pub const UNIFORM_EDGE_WEIGHT: f64 = 1.0;

#[derive(Debug, thiserror::Error)]
pub enum WeightTableLoadError {
    #[error("weight table `{}` does not exist", .0.display())]
    Missing(PathBuf),

    #[error("weight table is unreadable: {0}")]
    Unreadable(#[from] ParseError),

    #[error("weight table `{}` has no {column} column", path.display())]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("weight table `{}` row {row}: invalid weight `{value}`", path.display())]
    InvalidWeight {
        path: PathBuf,
        row: usize,
        value: String,
    },
}

/// Attribute name → weight, with [`DEFAULT_WEIGHT`] for misses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightTable {
    weights: HashMap<String, f64>,
}

impl WeightTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys are normalized the same way extracted attributes are.
    pub fn insert(&mut self, attribute: &str, weight: f64) -> Option<f64> {
        let key = normalize_cell(attribute)?;
        self.weights.insert(key, weight)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn get(&self, attribute: &str) -> Option<f64> {
        self.weights.get(attribute).copied()
    }

    /// Weight of `attribute`, or [`DEFAULT_WEIGHT`] when the table has no entry.
    pub fn weight_of(&self, attribute: &str) -> f64 {
        self.get(attribute).unwrap_or(DEFAULT_WEIGHT)
    }

    /// Load a two-column table (CSV or spreadsheet).
    ///
    /// Row 0 is a header. The weight column is the one titled `weight`; the key
    /// column is the first other column.
    pub fn load(path: &Path) -> Result<Self, WeightTableLoadError> {
        if !path.is_file() {
            return Err(WeightTableLoadError::Missing(path.to_path_buf()));
        }
        let bytes = std::fs::read(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let rows = read_grid(&name, &bytes, usize::MAX)?;
        let table = Self::from_rows(path, &rows)?;
        tracing::info!(path = %path.display(), entries = table.len(), "loaded weight table");
        Ok(table)
    }

    fn from_rows(path: &Path, rows: &[Vec<String>]) -> Result<Self, WeightTableLoadError> {
        let missing = |column| WeightTableLoadError::MissingColumn {
            path: path.to_path_buf(),
            column,
        };
        let header = rows.first().ok_or_else(|| missing("header"))?;
        let weight_col = header
            .iter()
            .position(|h| normalize_cell(h).as_deref() == Some("weight"))
            .ok_or_else(|| missing("weight"))?;
        let key_col = (0..header.len())
            .find(|&i| i != weight_col)
            .ok_or_else(|| missing("key"))?;

        let mut table = Self::new();
        for (row_idx, row) in rows.iter().enumerate().skip(1) {
            let Some(key) = row.get(key_col).and_then(|k| normalize_cell(k)) else {
                continue;
            };
            let raw = row.get(weight_col).map(|w| w.trim()).unwrap_or_default();
            let weight = raw
                .parse::<f64>()
                .ok()
                .filter(|w| w.is_finite() && *w >= 0.0)
                .ok_or_else(|| WeightTableLoadError::InvalidWeight {
                    path: path.to_path_buf(),
                    row: row_idx,
                    value: raw.to_string(),
                })?;
            if let Some(previous) = table.weights.insert(key.clone(), weight) {
                tracing::warn!(
                    path = %path.display(),
                    attribute = %key,
                    previous,
                    weight,
                    "duplicate weight table key; keeping the later row"
                );
            }
        }
        Ok(table)
    }
}

impl<S: AsRef<str>> FromIterator<(S, f64)> for WeightTable {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (attribute, weight) in iter {
            table.insert(attribute.as_ref(), weight);
        }
        table
    }
}

/// The tag table and the variable table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightTables {
    pub tags: WeightTable,
    pub variables: WeightTable,
}

impl WeightTables {
    pub fn for_kind(&self, kind: AttributeKind) -> &WeightTable {
        match kind {
            AttributeKind::Tag => &self.tags,
            AttributeKind::Variable => &self.variables,
        }
    }

    /// Load whichever tables are configured; an unconfigured table is empty.
    pub fn load(
        tags: Option<&Path>,
        variables: Option<&Path>,
    ) -> Result<Self, WeightTableLoadError> {
        Ok(Self {
            tags: tags.map(WeightTable::load).transpose()?.unwrap_or_default(),
            variables: variables
                .map(WeightTable::load)
                .transpose()?
                .unwrap_or_default(),
        })
    }
}

/// How edge weights are derived from shared attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum Weighting {
    /// Sum of per-attribute judged weights.
    Judged(WeightTables),
    /// Every edge weighs [`UNIFORM_EDGE_WEIGHT`].
    Uniform,
}

impl Default for Weighting {
    fn default() -> Self {
        Self::Judged(WeightTables::default())
    }
}

impl Weighting {
    /// Judged weight of one attribute; zero under uniform weighting.
    pub fn attribute_weight(&self, kind: AttributeKind, attribute: &str) -> f64 {
        match self {
            Self::Judged(tables) => tables.for_kind(kind).weight_of(attribute),
            Self::Uniform => 0.0,
        }
    }

    pub fn is_uniform(&self) -> bool {
        matches!(self, Self::Uniform)
    }
}
