//! Snapshot directory: naming, listing and append-only writes.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use datamap_graph::SimilarityGraph;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::render::{GraphRenderer, RenderError};
use crate::{load_graph, GraphLoadError, SnapshotFormat, SnapshotWriteError};

/// Infix between the graph name and the timestamp of insertion snapshots.
pub const UPDATED_INFIX: &str = "-updated-";

/// Microsecond timestamp used in snapshot names; sorts chronologically.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%6f";

/// Subdirectory receiving the insertion snapshots of superseded generations.
pub const ARCHIVE_DIR: &str = "archive";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding snapshots and rendered assets.
    pub dir: PathBuf,
    /// Base name of every snapshot.
    pub graph_name: String,
    /// Format of newly written snapshots.
    pub format: SnapshotFormat,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./assets"),
            graph_name: "graph".to_string(),
            format: SnapshotFormat::Json,
        }
    }
}

/// Append-only set of graph snapshots in one directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    config: StoreConfig,
}

impl SnapshotStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    /// `<dir>/<name>.<ext>`, written by batch builds.
    pub fn base_path(&self) -> PathBuf {
        self.base_path_in(self.config.format)
    }

    fn base_path_in(&self, format: SnapshotFormat) -> PathBuf {
        self.config
            .dir
            .join(format!("{}.{}", self.config.graph_name, format.extension()))
    }

    fn updated_prefix(&self) -> String {
        format!("{}{UPDATED_INFIX}", self.config.graph_name)
    }

    /// Whether `path` belongs to the current generation: an insertion
    /// snapshot or one of its rendered assets.
    fn is_generation_file(&self, path: &Path) -> bool {
        let prefix = self.updated_prefix();
        path.file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.starts_with(&prefix))
    }

    /// Whether `path` names an insertion snapshot of this store.
    fn is_updated_snapshot(&self, path: &Path) -> bool {
        self.is_generation_file(path) && SnapshotFormat::from_path(path).is_some()
    }

    /// `(timestamp, collision suffix)` of an insertion snapshot name.
    fn order_key(&self, path: &Path) -> (String, Option<u64>) {
        let prefix = self.updated_prefix();
        let rest = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_prefix(&prefix))
            .unwrap_or_default();
        match rest.split_once('-') {
            Some((stamp, n)) => (stamp.to_string(), n.parse().ok()),
            None => (rest.to_string(), None),
        }
    }

    fn list_dir(&self) -> Result<Vec<PathBuf>, std::io::Error> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.config.dir)? {
            let path = entry?.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// Insertion snapshots of the current generation, oldest first.
    ///
    /// Ordered by timestamp, then by numeric collision suffix (`-9` before
    /// `-10`).
    pub fn updated_snapshots(&self) -> Result<Vec<PathBuf>, GraphLoadError> {
        let dir = &self.config.dir;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut found: Vec<PathBuf> = self
            .list_dir()
            .map_err(|source| GraphLoadError::Io {
                path: dir.clone(),
                source,
            })?
            .into_iter()
            .filter(|p| self.is_updated_snapshot(p))
            .collect();
        found.sort_by(|a, b| {
            self.order_key(a)
                .cmp(&self.order_key(b))
                .then_with(|| a.cmp(b))
        });
        Ok(found)
    }

    /// Newest insertion snapshot, else the base snapshot if it exists.
    pub fn latest(&self) -> Result<Option<PathBuf>, GraphLoadError> {
        if let Some(newest) = self.updated_snapshots()?.pop() {
            return Ok(Some(newest));
        }
        let configured = self.base_path();
        if configured.is_file() {
            return Ok(Some(configured));
        }
        Ok(SnapshotFormat::ALL
            .into_iter()
            .map(|format| self.base_path_in(format))
            .find(|p| p.is_file()))
    }

    /// Path of the newest snapshot. A store with no snapshot at all is an error.
    pub fn latest_path(&self) -> Result<PathBuf, GraphLoadError> {
        self.latest()?.ok_or_else(|| GraphLoadError::NoSnapshots {
            dir: self.config.dir.clone(),
            name: self.config.graph_name.clone(),
        })
    }

    /// Load the newest snapshot.
    pub fn load_latest(&self) -> Result<(PathBuf, SimilarityGraph), GraphLoadError> {
        let path = self.latest_path()?;
        let graph = load_graph(&path)?;
        Ok((path, graph))
    }

    fn ensure_dir(&self) -> Result<(), SnapshotWriteError> {
        fs::create_dir_all(&self.config.dir).map_err(|source| SnapshotWriteError::Io {
            path: self.config.dir.clone(),
            source,
        })
    }

    /// Encode `graph` into a hidden temporary file inside the store directory.
    fn stage(&self, text: &str) -> Result<NamedTempFile, SnapshotWriteError> {
        let dir = &self.config.dir;
        let io_err = |source: std::io::Error| SnapshotWriteError::Io {
            path: dir.clone(),
            source,
        };
        let mut staged = tempfile::Builder::new()
            .prefix(".")
            .suffix(".partial")
            .tempfile_in(dir)
            .map_err(io_err)?;
        staged.write_all(text.as_bytes()).map_err(io_err)?;
        staged.as_file().sync_all().map_err(io_err)?;
        Ok(staged)
    }

    /// Write the base snapshot, starting a new generation.
    ///
    /// The previous base is replaced atomically. Insertion snapshots built on
    /// top of it move to `<dir>/archive/<name>-<timestamp>/`, so the next
    /// insertion starts from the fresh base.
    pub fn write_base(&self, graph: &SimilarityGraph) -> Result<PathBuf, SnapshotWriteError> {
        self.ensure_dir()?;
        let path = self.base_path();
        let staged = self.stage(&self.config.format.encode(graph, Utc::now())?)?;
        self.archive_generation(Utc::now())?;
        staged
            .persist(&path)
            .map_err(|err| SnapshotWriteError::Io {
                path: path.clone(),
                source: err.error,
            })?;
        tracing::info!(path = %path.display(), "wrote base graph snapshot");
        Ok(path)
    }

    /// Move the current generation's insertion snapshots and assets out of
    /// the way. Returns the archive directory, if anything was moved.
    fn archive_generation(&self, at: DateTime<Utc>) -> Result<Option<PathBuf>, SnapshotWriteError> {
        let io_err = |path: &Path, source: std::io::Error| SnapshotWriteError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut files: Vec<PathBuf> = self
            .list_dir()
            .map_err(|e| io_err(&self.config.dir, e))?
            .into_iter()
            .filter(|p| self.is_generation_file(p))
            .collect();
        if files.is_empty() {
            return Ok(None);
        }
        files.sort();

        let root = self.config.dir.join(ARCHIVE_DIR);
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
        let stem = format!("{}-{}", self.config.graph_name, at.format(TIMESTAMP_FORMAT));
        let mut attempt = 0usize;
        let target = loop {
            let candidate = match attempt {
                0 => root.join(&stem),
                n => root.join(format!("{stem}-{n}")),
            };
            match fs::create_dir(&candidate) {
                Ok(()) => break candidate,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(io_err(&candidate, e)),
            }
        };

        for file in &files {
            if let Some(name) = file.file_name() {
                fs::rename(file, target.join(name)).map_err(|e| io_err(file, e))?;
            }
        }
        tracing::info!(
            archive = %target.display(),
            files = files.len(),
            "archived previous snapshot generation"
        );
        Ok(Some(target))
    }

    /// Write `graph` as a new insertion snapshot named after `at`.
    ///
    /// The snapshot is staged in a temporary file and published with a
    /// no-clobber rename, so a failed write leaves no partial snapshot behind.
    /// A name that is already taken gets a `-<n>` suffix.
    pub fn write_snapshot(
        &self,
        graph: &SimilarityGraph,
        at: DateTime<Utc>,
    ) -> Result<PathBuf, SnapshotWriteError> {
        self.ensure_dir()?;
        let mut staged = self.stage(&self.config.format.encode(graph, at)?)?;
        let stem = format!(
            "{}{UPDATED_INFIX}{}",
            self.config.graph_name,
            at.format(TIMESTAMP_FORMAT)
        );
        let ext = self.config.format.extension();

        let mut attempt = 0usize;
        loop {
            let name = match attempt {
                0 => format!("{stem}.{ext}"),
                n => format!("{stem}-{n}.{ext}"),
            };
            let path = self.config.dir.join(name);
            match staged.persist_noclobber(&path) {
                Ok(_) => {
                    tracing::info!(path = %path.display(), "wrote graph snapshot");
                    return Ok(path);
                }
                Err(err) if err.error.kind() == ErrorKind::AlreadyExists => {
                    staged = err.file;
                    attempt += 1;
                }
                Err(err) => return Err(SnapshotWriteError::Io { path, source: err.error }),
            }
        }
    }

    /// Remove an insertion snapshot that was published but must not stay
    /// live. Failure to remove it is logged.
    pub(crate) fn withdraw(&self, snapshot: &Path) {
        if let Err(error) = fs::remove_file(snapshot) {
            tracing::warn!(
                path = %snapshot.display(),
                error = %error,
                "could not withdraw graph snapshot"
            );
        } else {
            tracing::info!(path = %snapshot.display(), "withdrew graph snapshot");
        }
    }

    /// Where the rendered artifact for `snapshot` lives.
    pub fn asset_path(&self, snapshot: &Path, renderer: &dyn GraphRenderer) -> PathBuf {
        snapshot.with_extension(renderer.extension())
    }

    /// Render `graph` next to `snapshot`.
    pub fn render(
        &self,
        graph: &SimilarityGraph,
        snapshot: &Path,
        renderer: &dyn GraphRenderer,
    ) -> Result<PathBuf, RenderError> {
        let destination = self.asset_path(snapshot, renderer);
        let out = renderer.render(graph, &destination)?;
        tracing::info!(path = %out.display(), "rendered graph");
        Ok(out)
    }
}
