//! `datamap` configuration: an optional JSON file, overridden by flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use datamap_graph::{WeightTables, Weighting};
use datamap_ingest::ResourceScanOptions;
use datamap_storage::{SnapshotFormat, StoreConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatamapConfig {
    /// Base name of the batch snapshot and its rendered page.
    pub graph_name: String,
    /// Snapshots and rendered assets.
    pub store_dir: PathBuf,
    /// Resources for batch builds.
    pub data_dir: PathBuf,
    pub file_types: Vec<String>,
    /// At most this many resources enter a batch build.
    pub max_datasets: usize,
    /// `false` gives every edge weight 1.0.
    pub include_weights: bool,
    pub tag_weights: Option<PathBuf>,
    pub variable_weights: Option<PathBuf>,
    pub snapshot_format: SnapshotFormat,
}

impl Default for DatamapConfig {
    fn default() -> Self {
        let scan = ResourceScanOptions::default();
        Self {
            graph_name: "graph".to_string(),
            store_dir: PathBuf::from("./assets"),
            data_dir: PathBuf::from("./data"),
            file_types: scan.include_extensions,
            max_datasets: scan.max_files,
            include_weights: true,
            tag_weights: None,
            variable_weights: None,
            snapshot_format: SnapshotFormat::Json,
        }
    }
}

impl DatamapConfig {
    /// Read `path` if given, else the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn store(&self) -> StoreConfig {
        StoreConfig {
            dir: self.store_dir.clone(),
            graph_name: self.graph_name.clone(),
            format: self.snapshot_format,
        }
    }

    pub fn scan_options(&self) -> ResourceScanOptions {
        ResourceScanOptions {
            max_files: self.max_datasets,
            include_extensions: self.file_types.clone(),
        }
    }

    /// Load the weight tables, or uniform weighting when weights are off.
    pub fn weighting(&self) -> Result<Weighting> {
        if !self.include_weights {
            return Ok(Weighting::Uniform);
        }
        let tables = WeightTables::load(
            self.tag_weights.as_deref(),
            self.variable_weights.as_deref(),
        )
        .context("failed to load weight tables")?;
        Ok(Weighting::Judged(tables))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("datamap.json");
        fs::write(&path, r#"{ "graph_name": "hdx", "snapshot_format": "gexf" }"#).unwrap();
        let config = DatamapConfig::load(Some(&path)).unwrap();
        assert_eq!(config.graph_name, "hdx");
        assert_eq!(config.snapshot_format, SnapshotFormat::Gexf);
        assert_eq!(config.max_datasets, 400);
        assert_eq!(config.file_types, vec!["csv", "xls", "xlsx"]);
        assert!(config.include_weights);
    }

    #[test]
    fn weights_off_means_uniform() {
        let config = DatamapConfig {
            include_weights: false,
            tag_weights: Some(PathBuf::from("/does/not/exist.csv")),
            ..DatamapConfig::default()
        };
        assert!(config.weighting().unwrap().is_uniform());
    }

    #[test]
    fn missing_weight_file_is_an_error() {
        let config = DatamapConfig {
            tag_weights: Some(PathBuf::from("/does/not/exist.csv")),
            ..DatamapConfig::default()
        };
        assert!(config.weighting().is_err());
    }
}
