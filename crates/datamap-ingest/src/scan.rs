//! Listing candidate resources in a data directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

/// Options controlling resource discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceScanOptions {
    /// Maximum number of resources to return (the batch limit).
    pub max_files: usize,
    /// File suffixes to include (lowercase, without dot).
    pub include_extensions: Vec<String>,
}

impl Default for ResourceScanOptions {
    fn default() -> Self {
        Self {
            max_files: 400,
            include_extensions: vec!["csv".to_string(), "xls".to_string(), "xlsx".to_string()],
        }
    }
}

/// One candidate resource. `index` is its position in the listing and becomes
/// the node id when the resource is accepted into a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub index: usize,
    pub title: String,
    pub path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("data directory `{}` does not exist", .0.display())]
    MissingDir(PathBuf),

    #[error("failed to list data directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// List regular files directly inside `dir`, sorted by file name.
///
/// Hidden files and files whose suffix is not in `include_extensions` are
/// ignored. The result is truncated to `max_files`.
pub fn scan_resources(dir: &Path, options: &ResourceScanOptions) -> Result<Vec<ResourceRef>, ScanError> {
    if !dir.is_dir() {
        return Err(ScanError::MissingDir(dir.to_path_buf()));
    }

    let mut resources = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        if resources.len() >= options.max_files {
            break;
        }
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !options
            .include_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
        {
            continue;
        }

        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        resources.push(ResourceRef {
            index: resources.len(),
            title,
            path: path.to_path_buf(),
        });
    }

    tracing::debug!(dir = %dir.display(), count = resources.len(), "scanned resources");
    Ok(resources)
}
