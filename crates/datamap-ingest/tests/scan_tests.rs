use datamap_ingest::{scan_resources, ResourceScanOptions, ScanError};
use std::fs;
use tempfile::tempdir;

#[test]
fn scan_lists_matching_files_in_name_order() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("b_health.csv"), "a\n#a\n").unwrap();
    fs::write(dir.path().join("a_food.XLSX"), "").unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
    fs::write(dir.path().join(".hidden.csv"), "ignored").unwrap();
    fs::create_dir(dir.path().join("nested.csv")).unwrap();

    let resources = scan_resources(dir.path(), &ResourceScanOptions::default()).unwrap();
    let titles: Vec<&str> = resources.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["a_food", "b_health"]);
    assert_eq!(resources[0].index, 0);
    assert_eq!(resources[1].index, 1);
}

#[test]
fn scan_respects_max_files() {
    let dir = tempdir().unwrap();
    for i in 0..5 {
        fs::write(dir.path().join(format!("r{i}.csv")), "a\n#a\n").unwrap();
    }
    let options = ResourceScanOptions {
        max_files: 3,
        ..ResourceScanOptions::default()
    };
    let resources = scan_resources(dir.path(), &options).unwrap();
    assert_eq!(resources.len(), 3);
    assert_eq!(resources[2].title, "r2");
}

#[test]
fn scan_of_missing_dir_fails() {
    let dir = tempdir().unwrap();
    let err = scan_resources(&dir.path().join("absent"), &ResourceScanOptions::default())
        .unwrap_err();
    assert!(matches!(err, ScanError::MissingDir(_)));
}
