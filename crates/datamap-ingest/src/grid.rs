//! Reading the leading rows of a tabular resource into strings.

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::ParseError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Encodings a resource may use, selected by file-name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
    Csv,
    Spreadsheet,
}

impl TabularFormat {
    /// Picks the parser for `name` from its (case-insensitive) suffix.
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = Path::new(name)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "xls" | "xlsx" | "xlsm" | "xlsb" | "ods" => Some(Self::Spreadsheet),
            _ => None,
        }
    }
}

/// Read at most `max_rows` rows of `bytes`, interpreting them according to the
/// suffix of `name`. No header interpretation happens here: row 0 is returned
/// like any other row.
pub fn read_grid(name: &str, bytes: &[u8], max_rows: usize) -> Result<Vec<Vec<String>>, ParseError> {
    match TabularFormat::from_name(name) {
        Some(TabularFormat::Csv) => read_csv(name, bytes, max_rows),
        Some(TabularFormat::Spreadsheet) => read_spreadsheet(name, bytes, max_rows),
        None => Err(ParseError::UnsupportedType {
            resource: name.to_string(),
        }),
    }
}

fn read_csv(name: &str, bytes: &[u8], max_rows: usize) -> Result<Vec<Vec<String>>, ParseError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records().take(max_rows) {
        let record = record.map_err(|err| ParseError::Decode {
            resource: name.to_string(),
            message: err.to_string(),
        })?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

fn read_spreadsheet(
    name: &str,
    bytes: &[u8],
    max_rows: usize,
) -> Result<Vec<Vec<String>>, ParseError> {
    let decode = |message: String| ParseError::Decode {
        resource: name.to_string(),
        message,
    };

    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|err| decode(err.to_string()))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|err| decode(err.to_string()))?,
        None => return Ok(Vec::new()),
    };

    Ok(range
        .rows()
        .take(max_rows)
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_is_chosen_by_suffix() {
        assert_eq!(TabularFormat::from_name("a.csv"), Some(TabularFormat::Csv));
        assert_eq!(TabularFormat::from_name("A.CSV"), Some(TabularFormat::Csv));
        assert_eq!(
            TabularFormat::from_name("report.xlsx"),
            Some(TabularFormat::Spreadsheet)
        );
        assert_eq!(
            TabularFormat::from_name("report.XLS"),
            Some(TabularFormat::Spreadsheet)
        );
        assert_eq!(TabularFormat::from_name("notes.txt"), None);
        assert_eq!(TabularFormat::from_name("no_suffix"), None);
    }

    #[test]
    fn csv_rows_are_limited_and_ragged_rows_allowed() {
        let text = "a,b,c\n#x,#y\n1,2,3,4\n";
        let rows = read_grid("t.csv", text.as_bytes(), 2).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["a", "b", "c"]);
        assert_eq!(rows[1], vec!["#x", "#y"]);
    }

    #[test]
    fn csv_bom_is_stripped() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"name,age\n#a,#b\n");
        let rows = read_grid("t.csv", &bytes, 2).unwrap();
        assert_eq!(rows[0][0], "name");
    }

    #[test]
    fn invalid_utf8_csv_is_a_decode_error() {
        let bytes = b"ok,\xff\xfe\n#a,#b\n";
        let err = read_grid("bad.csv", bytes, 2).unwrap_err();
        assert!(matches!(err, ParseError::Decode { .. }), "{err:?}");
    }

    #[test]
    fn garbage_workbook_is_a_decode_error() {
        let err = read_grid("bad.xlsx", b"definitely not a zip archive", 2).unwrap_err();
        assert!(matches!(err, ParseError::Decode { .. }), "{err:?}");
    }

    #[test]
    fn unknown_suffix_is_unsupported() {
        let err = read_grid("data.json", b"{}", 2).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedType { .. }));
        assert_eq!(err.resource(), "data.json");
    }
}
