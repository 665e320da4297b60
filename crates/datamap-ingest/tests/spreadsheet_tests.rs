//! Attribute extraction from a real workbook.
//!
//! `fixtures/facilities.xlsx` has one sheet:
//!
//! | A        | B    | C     | D         |
//! |----------|------|-------|-----------|
//! | Province |      | 2020  | Bed Count |
//! | #adm1    | #x   | #date | 1.5       |
//! | North    |      | 10    |           |
//!
//! `C1` and `D2` are numeric cells; `B1` is blank.

use std::path::Path;

use datamap_ingest::{extract_attributes, extract_from_path, read_grid};

const WORKBOOK: &[u8] = include_bytes!("fixtures/facilities.xlsx");

fn fixture_path() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/facilities.xlsx"))
}

#[test]
fn grid_keeps_blank_and_numeric_cells_in_place() {
    let rows = read_grid("facilities.xlsx", WORKBOOK, 2).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], vec!["Province", "", "2020", "Bed Count"]);
    assert_eq!(rows[1], vec!["#adm1", "#x", "#date", "1.5"]);
}

#[test]
fn workbook_attributes_are_normalized() {
    let attrs = extract_attributes("facilities.xlsx", WORKBOOK).unwrap();
    assert_eq!(attrs.variables, vec!["province", "2020", "bedcount"]);
    assert_eq!(attrs.hxl_tags, vec!["#adm1", "#x", "#date"]);
}

#[test]
fn xls_suffix_selects_the_workbook_reader() {
    let attrs = extract_attributes("facilities.xls", WORKBOOK).unwrap();
    assert_eq!(attrs.hxl_tags, vec!["#adm1", "#x", "#date"]);
}

#[test]
fn workbook_on_disk_matches_in_memory() {
    let from_disk = extract_from_path(fixture_path()).unwrap();
    let in_memory = extract_attributes("facilities.xlsx", WORKBOOK).unwrap();
    assert_eq!(from_disk, in_memory);
}

