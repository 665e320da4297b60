//! End-to-end tests for the snapshot store and insertion pipeline

use super::*;
use approx::assert_relative_eq;
use chrono::{TimeZone, Utc};
use datamap_graph::{ConnectivitySummary, DatasetNode, SimilarityEdge, Weighting, CANDIDATE_COLOR};
use datamap_ingest::DatasetAttributes;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// Writes the node count; enough to observe that rendering happened.
struct CountRenderer;

impl GraphRenderer for CountRenderer {
    fn extension(&self) -> &'static str {
        "txt"
    }

    fn render(&self, graph: &SimilarityGraph, destination: &Path) -> Result<PathBuf, RenderError> {
        render::write_artifact(destination, graph.node_count().to_string())
    }
}

fn attrs(vars: &[&str], tags: &[&str]) -> DatasetAttributes {
    DatasetAttributes {
        variables: vars.iter().map(|s| s.to_string()).collect(),
        hxl_tags: tags.iter().map(|s| s.to_string()).collect(),
    }
}

fn sample_graph() -> SimilarityGraph {
    let mut g = SimilarityGraph::new();
    g.add_node(DatasetNode::new(0, "Health facilities", attrs(&["province", "beds"], &["#adm1"])))
        .unwrap();
    g.add_node(DatasetNode::new(2, "Food prices", attrs(&["province", "price"], &["#adm1", "#value"])))
        .unwrap();
    g.add_node(
        DatasetNode::new(5, "upload.csv", attrs(&["x&y", "<tag>"], &[])).with_color(CANDIDATE_COLOR),
    )
    .unwrap();
    g.add_edge(SimilarityEdge {
        source: 0,
        target: 2,
        weight: 2.5,
        shared_count: 2,
        tag_proportion: 1.0,
        variable_proportion: 0.5,
        label: "#adm1, province".to_string(),
        color: None,
    })
    .unwrap();
    g.add_edge(SimilarityEdge {
        source: 2,
        target: 5,
        weight: 0.1 + 0.2,
        shared_count: 1,
        tag_proportion: 0.0,
        variable_proportion: 0.33,
        label: "\"quoted\"".to_string(),
        color: Some(CANDIDATE_COLOR.to_string()),
    })
    .unwrap();
    g
}

fn store_in(dir: &Path, format: SnapshotFormat) -> SnapshotStore {
    SnapshotStore::new(StoreConfig {
        dir: dir.to_path_buf(),
        graph_name: "graph".to_string(),
        format,
    })
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn snapshots_round_trip_in_both_formats() {
    let dir = tempdir().unwrap();
    let graph = sample_graph();
    for format in SnapshotFormat::ALL {
        let path = dir.path().join(format!("rt.{}", format.extension()));
        save_graph(&graph, &path).unwrap();
        let loaded = load_graph(&path).unwrap();
        assert_eq!(loaded, graph, "{format:?} round trip");
    }
}

#[test]
fn gexf_exposes_node_and_edge_attributes() {
    let text = SnapshotFormat::Gexf
        .encode(&sample_graph(), Utc::now())
        .unwrap();
    assert!(text.contains("value=\"#adm1,#value\""));
    assert!(text.contains("value=\"province,price\""));
    assert!(text.contains("weight=\"2.5\""));
    assert!(text.contains("value=\"#adm1, province\""));
    assert!(text.contains("x&amp;y"));
}

#[test]
fn snapshot_names_never_collide() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path(), SnapshotFormat::Json);
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let graph = sample_graph();

    let first = store.write_snapshot(&graph, at).unwrap();
    let second = store.write_snapshot(&graph, at).unwrap();
    assert_ne!(first, second);
    assert_eq!(
        first.file_name().unwrap(),
        "graph-updated-20240501120000000000.json"
    );
    assert_eq!(
        second.file_name().unwrap(),
        "graph-updated-20240501120000000000-1.json"
    );
    assert_eq!(store.latest().unwrap(), Some(second));
}

#[test]
fn latest_prefers_newest_insertion_then_base() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path(), SnapshotFormat::Json);
    assert_eq!(store.latest().unwrap(), None);
    assert!(matches!(
        store.load_latest(),
        Err(GraphLoadError::NoSnapshots { .. })
    ));

    let graph = sample_graph();
    let base = store.write_base(&graph).unwrap();
    assert_eq!(store.latest().unwrap(), Some(base));

    let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let late = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let newer = store.write_snapshot(&graph, late).unwrap();
    store.write_snapshot(&graph, early).unwrap();
    assert_eq!(store.updated_snapshots().unwrap().len(), 2);
    assert_eq!(store.latest().unwrap(), Some(newer));
}

#[test]
fn other_graph_names_are_ignored() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path(), SnapshotFormat::Json);
    let other = SnapshotStore::new(StoreConfig {
        dir: dir.path().to_path_buf(),
        graph_name: "other".to_string(),
        format: SnapshotFormat::Json,
    });
    other.write_snapshot(&sample_graph(), Utc::now()).unwrap();
    assert!(store.updated_snapshots().unwrap().is_empty());
}

#[test]
fn insertion_writes_a_new_snapshot_and_renders_it() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path(), SnapshotFormat::Json);
    let base = store.write_base(&sample_graph()).unwrap();
    let base_bytes = fs::read(&base).unwrap();

    let upload = b"Province,Beds,Notes\n#adm1,#capacity,\n1,2,3\n";
    let report = insert_dataset(
        &store,
        None,
        &InsertRequest::new("clinics.csv", upload),
        &Weighting::default(),
        &CountRenderer,
    )
    .unwrap();

    assert_ne!(report.snapshot, base);
    assert_eq!(fs::read(&base).unwrap(), base_bytes);
    assert_eq!(report.node_id, Some(6));
    assert_eq!(report.connected, vec!["Health facilities", "Food prices"]);

    // health: #adm1 + province + beds; food: #adm1 + province.
    assert_eq!(report.summary.connected_datasets, 2);
    assert_eq!(report.summary.tags_shared, 2);
    assert_eq!(report.summary.variables_shared, 3);
    assert_relative_eq!(report.summary.total_edge_weight, 2.5);

    let asset = report.asset.unwrap();
    assert_eq!(fs::read_to_string(&asset).unwrap(), "4");
    let stored = load_graph(&report.snapshot).unwrap();
    assert_eq!(stored.node_count(), 4);
    assert_eq!(stored.node(6).unwrap().color.as_deref(), Some(CANDIDATE_COLOR));
    assert_eq!(store.latest().unwrap(), Some(report.snapshot));
}

#[test]
fn corrupt_store_aborts_without_writing() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path(), SnapshotFormat::Json);
    fs::write(store.base_path(), "{ not json").unwrap();
    let before = files_in(dir.path());

    let err = insert_dataset(
        &store,
        None,
        &InsertRequest::new("clinics.csv", b"a,b\n#x,#y\n"),
        &Weighting::default(),
        &CountRenderer,
    )
    .unwrap_err();

    assert!(matches!(err, InsertError::Load(GraphLoadError::Corrupt { .. })));
    assert_eq!(files_in(dir.path()), before);
}

#[test]
fn missing_store_is_a_load_error() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir.path().join("nowhere"), SnapshotFormat::Json);
    let err = insert_dataset(
        &store,
        None,
        &InsertRequest::new("clinics.csv", b"a,b\n#x,#y\n"),
        &Weighting::default(),
        &CountRenderer,
    )
    .unwrap_err();
    assert!(matches!(err, InsertError::Load(GraphLoadError::NoSnapshots { .. })));
}

#[test]
fn unreadable_upload_aborts_without_writing() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path(), SnapshotFormat::Gexf);
    store.write_base(&sample_graph()).unwrap();
    let before = files_in(dir.path());

    for (name, bytes) in [("notes.txt", &b"a,b\n#x,#y\n"[..]), ("short.csv", &b"only,a,header\n"[..])] {
        let err = insert_dataset(
            &store,
            None,
            &InsertRequest::new(name, bytes),
            &Weighting::default(),
            &CountRenderer,
        )
        .unwrap_err();
        assert!(matches!(err, InsertError::Parse(_)), "{name}: {err}");
    }
    assert_eq!(files_in(dir.path()), before);
}

#[test]
fn empty_trigger_reports_latest_snapshot() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path(), SnapshotFormat::Json);
    let base = store.write_base(&sample_graph()).unwrap();
    let before = files_in(dir.path());

    let report = insert_dataset(
        &store,
        None,
        &InsertRequest::empty(),
        &Weighting::default(),
        &CountRenderer,
    )
    .unwrap();
    assert_eq!(report.snapshot, base);
    assert!(report.asset.is_none());
    assert!(report.node_id.is_none());
    assert!(report.connected.is_empty());
    assert_eq!(report.summary, ConnectivitySummary::default());
    assert_eq!(files_in(dir.path()), before);
}

#[test]
fn explicit_source_snapshot_is_used() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path(), SnapshotFormat::Json);
    store.write_base(&sample_graph()).unwrap();
    let empty = dir.path().join("empty.json");
    save_graph(&SimilarityGraph::new(), &empty).unwrap();

    let report = insert_dataset(
        &store,
        Some(&empty),
        &InsertRequest::new("first.csv", b"province\n#adm1\n"),
        &Weighting::default(),
        &CountRenderer,
    )
    .unwrap();
    assert_eq!(report.node_id, Some(0));
    assert!(report.connected.is_empty());
}

struct FailingRenderer;

impl GraphRenderer for FailingRenderer {
    fn extension(&self) -> &'static str {
        "html"
    }

    fn render(&self, _graph: &SimilarityGraph, _destination: &Path) -> Result<PathBuf, RenderError> {
        Err(RenderError::Encode("template unavailable".to_string()))
    }
}

#[test]
fn rebuild_starts_a_new_generation() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path(), SnapshotFormat::Json);
    store.write_base(&sample_graph()).unwrap();
    let first = insert_dataset(
        &store,
        None,
        &InsertRequest::new("clinics.csv", b"province\n#adm1\n"),
        &Weighting::default(),
        &CountRenderer,
    )
    .unwrap();

    let mut fresh = SimilarityGraph::new();
    fresh.add_node(DatasetNode::new(0, "new-a", attrs(&["q"], &[]))).unwrap();
    fresh.add_node(DatasetNode::new(1, "new-b", attrs(&["q"], &[]))).unwrap();
    let base = store.write_base(&fresh).unwrap();
    assert!(store.updated_snapshots().unwrap().is_empty());
    assert_eq!(store.latest().unwrap(), Some(base));

    let archived: Vec<PathBuf> = fs::read_dir(dir.path().join(store::ARCHIVE_DIR))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(archived.len(), 1);
    assert!(archived[0].join(first.snapshot.file_name().unwrap()).is_file());
    assert!(archived[0].join(first.asset.unwrap().file_name().unwrap()).is_file());

    let report = insert_dataset(
        &store,
        None,
        &InsertRequest::new("upload.csv", b"q\ny\n"),
        &Weighting::default(),
        &CountRenderer,
    )
    .unwrap();
    assert_eq!(report.connected, vec!["new-a", "new-b"]);
    assert_eq!(report.node_id, Some(2));
}

#[test]
fn render_failure_withdraws_the_new_snapshot() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path(), SnapshotFormat::Json);
    let base = store.write_base(&sample_graph()).unwrap();
    let before = files_in(dir.path());

    let err = insert_dataset(
        &store,
        None,
        &InsertRequest::new("clinics.csv", b"province\n#adm1\n"),
        &Weighting::default(),
        &FailingRenderer,
    )
    .unwrap_err();

    assert!(matches!(err, InsertError::Render(_)));
    assert_eq!(files_in(dir.path()), before);
    assert_eq!(store.latest().unwrap(), Some(base));
}

#[test]
fn writes_leave_no_staging_files() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path(), SnapshotFormat::Gexf);
    store.write_base(&sample_graph()).unwrap();
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    store.write_snapshot(&sample_graph(), at).unwrap();
    store.write_snapshot(&sample_graph(), at).unwrap();
    assert_eq!(
        files_in(dir.path()),
        vec![
            "graph-updated-20240501120000000000-1.gexf",
            "graph-updated-20240501120000000000.gexf",
            "graph.gexf",
        ]
    );
}

#[test]
fn collision_suffixes_order_numerically() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path(), SnapshotFormat::Json);
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let graph = sample_graph();
    let written: Vec<PathBuf> = (0..11)
        .map(|_| store.write_snapshot(&graph, at).unwrap())
        .collect();

    assert_eq!(store.updated_snapshots().unwrap(), written);
    assert_eq!(
        store.latest().unwrap().unwrap().file_name().unwrap(),
        "graph-updated-20240501120000000000-10.json"
    );
}

#[test]
fn empty_trigger_does_not_decode_the_store() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path(), SnapshotFormat::Json);
    fs::write(store.base_path(), "{ not json").unwrap();

    let report = insert_dataset(
        &store,
        None,
        &InsertRequest::empty(),
        &Weighting::default(),
        &CountRenderer,
    )
    .unwrap();
    assert_eq!(report.snapshot, store.base_path());
    assert!(report.node_id.is_none());
}
