//! CSV tabular source.
//!
//! Follows the usual dataframe-loader conventions: the first record is the
//! header, common NA spellings become nulls, and each column gets one type
//! inferred from all of its non-null cells.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info};

use crate::decode::decode_with_candidates;
use crate::table::{DecodedTable, Table};
use tablerag_core::{CellValue, Error, Result};

/// Cell spellings read as null.
pub const DEFAULT_NULL_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Reads a dataset into a [`Table`].
pub trait TabularSource: Send + Sync {
    /// Read `path`, trying `encodings` in order until one decodes cleanly.
    fn read(&self, path: &Path, encodings: &[String]) -> Result<DecodedTable>;
}

#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub null_markers: Vec<String>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            null_markers: DEFAULT_NULL_MARKERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CsvSource {
    options: CsvOptions,
}

/// Type shared by every non-null cell of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Bool,
    Int,
    Float,
    Text,
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "True" | "TRUE" | "true" => Some(true),
        "False" | "FALSE" | "false" => Some(false),
        _ => None,
    }
}

/// Infer one column's type from its cells, `None` marking a null.
///
/// An all-null column is float, and an int column holding any null widens
/// to float, since integers have no null of their own.
fn infer_column_type<'a>(cells: impl Iterator<Item = Option<&'a str>> + Clone) -> ColumnType {
    let has_null = cells.clone().any(|c| c.is_none());
    let mut present = cells.flatten().peekable();
    if present.peek().is_none() {
        return ColumnType::Float;
    }
    if present.clone().all(|c| parse_bool(c).is_some()) {
        ColumnType::Bool
    } else if present.clone().all(|c| c.trim().parse::<i64>().is_ok()) {
        if has_null {
            ColumnType::Float
        } else {
            ColumnType::Int
        }
    } else if present.all(|c| c.trim().parse::<f64>().is_ok()) {
        ColumnType::Float
    } else {
        ColumnType::Text
    }
}

/// Rows of an all-numeric table share one numeric type, so int columns
/// widen to float as soon as any column is float.
fn unify_numeric(types: &mut [ColumnType]) {
    let all_numeric = types
        .iter()
        .all(|t| matches!(t, ColumnType::Int | ColumnType::Float));
    if all_numeric && types.contains(&ColumnType::Float) {
        for ty in types.iter_mut() {
            *ty = ColumnType::Float;
        }
    }
}

fn convert(raw: &str, ty: ColumnType) -> CellValue {
    match ty {
        ColumnType::Bool => parse_bool(raw).map(CellValue::Bool),
        ColumnType::Int => raw.trim().parse().ok().map(CellValue::Int),
        ColumnType::Float => raw.trim().parse().ok().map(CellValue::Float),
        ColumnType::Text => None,
    }
    .unwrap_or_else(|| CellValue::text(raw))
}

/// Blank names become `Unnamed: <i>`; repeats get `.1`, `.2`, ... suffixes.
fn dedupe_header(raw: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    raw.into_iter()
        .enumerate()
        .map(|(i, name)| {
            let base = if name.is_empty() {
                format!("Unnamed: {}", i)
            } else {
                name
            };
            let mut candidate = base.clone();
            let mut n = 1;
            while taken.contains(&candidate) {
                candidate = format!("{}.{}", base, n);
                n += 1;
            }
            taken.insert(candidate.clone());
            candidate
        })
        .collect()
}

impl CsvSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CsvOptions) -> Self {
        Self { options }
    }

    /// Parse already-decoded CSV text.
    pub fn parse_str(&self, text: &str) -> Result<Table> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.options.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut records = reader.records();
        let header = match records.next() {
            Some(record) => record.map_err(|e| Error::Read(format!("header: {}", e)))?,
            None => return Err(Error::Read("no columns to parse from source".into())),
        };
        let columns = dedupe_header(header.iter().map(|s| s.to_string()).collect());
        let width = columns.len();

        // Raw cells; None marks a null.
        let mut raw_rows: Vec<Vec<Option<String>>> = Vec::new();
        for record in records {
            let record = record.map_err(|e| Error::Read(e.to_string()))?;
            if record.len() > width {
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                return Err(Error::Read(format!(
                    "malformed row at line {}: expected {} fields, saw {}",
                    line,
                    width,
                    record.len()
                )));
            }
            let mut cells: Vec<Option<String>> = record
                .iter()
                .map(|cell| {
                    if self.options.null_markers.iter().any(|m| m == cell) {
                        None
                    } else {
                        Some(cell.to_string())
                    }
                })
                .collect();
            cells.resize(width, None);
            raw_rows.push(cells);
        }

        let mut types: Vec<ColumnType> = (0..width)
            .map(|col| infer_column_type(raw_rows.iter().map(|r| r[col].as_deref())))
            .collect();
        unify_numeric(&mut types);
        debug!("Inferred column types: {:?}", types);

        let rows = raw_rows
            .into_iter()
            .map(|cells| {
                cells
                    .into_iter()
                    .zip(&types)
                    .map(|(cell, &ty)| match cell {
                        Some(raw) => convert(&raw, ty),
                        None => CellValue::Null,
                    })
                    .collect()
            })
            .collect();

        Table::new(columns, rows)
    }
}

impl TabularSource for CsvSource {
    fn read(&self, path: &Path, encodings: &[String]) -> Result<DecodedTable> {
        let bytes = std::fs::read(path)
            .map_err(|e| Error::Read(format!("{}: {}", path.display(), e)))?;
        let decoded = decode_with_candidates(&bytes, encodings)?;
        info!(
            "Successfully read {} with {} encoding",
            path.display(),
            decoded.encoding
        );

        let table = self.parse_str(&decoded.text)?;
        Ok(DecodedTable {
            table,
            encoding: decoded.encoding,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn encodings() -> Vec<String> {
        vec!["utf-8".into(), "gbk".into()]
    }

    #[test]
    fn test_parse_types_and_nulls() {
        let table = CsvSource::new()
            .parse_str("city,age,score,member\nNYC,30,1.5,True\nLA,,2,false\n")
            .unwrap();

        assert_eq!(table.columns(), &["city", "age", "score", "member"]);
        assert_eq!(
            table.rows()[0],
            vec![
                CellValue::text("NYC"),
                CellValue::Float(30.0),
                CellValue::Float(1.5),
                CellValue::Bool(true)
            ]
        );
        assert_eq!(
            table.rows()[1],
            vec![
                CellValue::text("LA"),
                CellValue::Null,
                CellValue::Float(2.0),
                CellValue::Bool(false)
            ]
        );
    }

    #[test]
    fn test_whole_number_in_float_column_renders_as_float() {
        let table = CsvSource::new().parse_str("age\n30\n30.5\n").unwrap();
        assert_eq!(table.rows()[0][0].to_string(), "30.0");
    }

    #[test]
    fn test_mixed_column_is_text() {
        let table = CsvSource::new().parse_str("code\n007\nA12\n").unwrap();
        assert_eq!(table.rows()[0][0], CellValue::text("007"));
    }

    #[test]
    fn test_short_rows_padded_with_nulls() {
        let table = CsvSource::new().parse_str("a,b,c\n1\n").unwrap();
        assert_eq!(
            table.rows()[0],
            vec![CellValue::Float(1.0), CellValue::Null, CellValue::Null]
        );
    }

    #[test]
    fn test_int_column_with_null_becomes_float() {
        let table = CsvSource::new().parse_str("city,age\nNYC,30\nLA,\n").unwrap();
        assert_eq!(table.rows()[0][1], CellValue::Float(30.0));
        assert_eq!(table.rows()[0][1].to_string(), "30.0");
        assert_eq!(table.rows()[1][1], CellValue::Null);
    }

    #[test]
    fn test_int_column_without_null_stays_int() {
        let table = CsvSource::new().parse_str("city,age\nNYC,30\nLA,41\n").unwrap();
        assert_eq!(table.rows()[0][1], CellValue::Int(30));
    }

    #[test]
    fn test_all_numeric_table_widens_ints() {
        let table = CsvSource::new().parse_str("a,b\n1,2.5\n").unwrap();
        assert_eq!(table.rows()[0], vec![CellValue::Float(1.0), CellValue::Float(2.5)]);
        assert_eq!(table.rows()[0][0].to_string(), "1.0");
    }

    #[test]
    fn test_text_column_blocks_numeric_widening() {
        let table = CsvSource::new().parse_str("a,b,c\n1,2.5,x\n").unwrap();
        assert_eq!(table.rows()[0][0], CellValue::Int(1));
    }

    #[test]
    fn test_all_int_table_stays_int() {
        let table = CsvSource::new().parse_str("a,b\n1,2\n").unwrap();
        assert_eq!(table.rows()[0], vec![CellValue::Int(1), CellValue::Int(2)]);
    }

    #[test]
    fn test_long_rows_are_malformed() {
        let err = CsvSource::new().parse_str("a,b\n1,2\n3,4,5\n").unwrap_err();
        match err {
            Error::Read(msg) => assert!(msg.contains("line 3"), "{}", msg),
            other => panic!("expected read error, got {:?}", other),
        }
    }

    #[test]
    fn test_header_only_is_empty_table() {
        let table = CsvSource::new().parse_str("city,age\n").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns().len(), 2);
    }

    #[test]
    fn test_empty_source_is_read_error() {
        assert!(matches!(
            CsvSource::new().parse_str(""),
            Err(Error::Read(_))
        ));
    }

    #[test]
    fn test_duplicate_and_blank_headers() {
        let table = CsvSource::new().parse_str("a,a,,a\n1,2,3,4\n").unwrap();
        assert_eq!(table.columns(), &["a", "a.1", "Unnamed: 2", "a.2"]);
    }

    #[test]
    fn test_quoted_fields() {
        let table = CsvSource::new()
            .parse_str("name,note\n\"Smith, J\",\"said \"\"hi\"\"\"\n")
            .unwrap();
        assert_eq!(table.rows()[0][0], CellValue::text("Smith, J"));
        assert_eq!(table.rows()[0][1], CellValue::text("said \"hi\""));
    }

    #[test]
    fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = CsvSource::new()
            .read(&dir.path().join("absent.csv"), &encodings())
            .unwrap_err();
        assert!(matches!(err, Error::Read(_)));
    }

    #[test]
    fn test_read_gbk_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cities.csv");
        let (bytes, _, _) = encoding_rs::GBK.encode("城市,人口\n北京,2154\n上海,2428\n");
        std::fs::write(&path, &bytes).unwrap();

        let decoded = CsvSource::new().read(&path, &encodings()).unwrap();
        assert_eq!(decoded.encoding, "GBK");
        assert_eq!(decoded.table.columns(), &["城市", "人口"]);
        assert_eq!(decoded.table.rows()[1][1], CellValue::Int(2428));
    }

    #[test]
    fn test_read_undecodable_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, b"a\n\xFF\n").unwrap();
        assert!(matches!(
            CsvSource::new().read(&path, &encodings()),
            Err(Error::Decode { .. })
        ));
    }
}
