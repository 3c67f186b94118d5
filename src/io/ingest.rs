//! CSV ingest and normalization.
//!
//! This module turns an instrument export (often with a few lines of preamble
//! before the real header) into a clean [`CalibrationDataset`].
//!
//! Steps, in order:
//! - locate the header row (blank lines are not counted)
//! - apply the row limit, then the leading-row skip
//! - drop columns whose every value is missing
//! - resolve the two requested columns (clear error if either is absent)
//! - drop rows missing either value, parse the rest as numbers
//!
//! No fitting logic lives here.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use log::{debug, info};

use crate::domain::{CalibrationDataset, CalibrationPoint};
use crate::error::AppError;

/// Tokens treated as a missing value (in addition to empty/whitespace cells).
///
/// This is the NA set spreadsheet and plate-reader exports commonly emit,
/// including Excel error markers.
const MISSING_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>", "N/A", "NA",
    "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Reader options for the input table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// 0-based index of the header row, counted over non-blank lines.
    pub header_row: usize,
    /// Maximum number of data rows read after the header.
    pub max_rows: Option<usize>,
    /// Number of leading data rows discarded after the header.
    pub skip_rows: Option<usize>,
    pub delimiter: u8,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            header_row: 0,
            max_rows: None,
            skip_rows: None,
            delimiter: b',',
        }
    }
}

/// Load calibration data from a delimited file.
pub fn import_data(
    source: &Path,
    response_column: &str,
    standards_column: &str,
    options: &ImportOptions,
) -> Result<CalibrationDataset, AppError> {
    let file = File::open(source).map_err(|e| AppError::io("Failed to open input file", source, e))?;
    let dataset = import_from_reader(file, response_column, standards_column, options)?;
    info!("Imported {} calibration rows from '{}'", dataset.len(), source.display());
    Ok(dataset)
}

/// Same as [`import_data`], reading from any byte source.
pub fn import_from_reader<R: Read>(
    reader: R,
    response_column: &str,
    standards_column: &str,
    options: &ImportOptions,
) -> Result<CalibrationDataset, AppError> {
    if response_column == standards_column {
        return Err(AppError::Input(format!(
            "The response and standards columns must differ (both are `{response_column}`)"
        )));
    }

    let table = RawTable::read(reader, options)?;

    let standards_idx = table.require_column(standards_column, "standard concentrations")?;
    let response_idx = table.require_column(response_column, "response")?;

    let mut points = Vec::with_capacity(table.rows.len());
    let mut dropped = 0usize;

    for row in &table.rows {
        let conc_raw = row.field(standards_idx);
        let resp_raw = row.field(response_idx);
        if is_missing(conc_raw) || is_missing(resp_raw) {
            dropped += 1;
            continue;
        }

        let concentration = parse_number(conc_raw, standards_column, row.line)?;
        let response = parse_number(resp_raw, response_column, row.line)?;
        if concentration < 0.0 {
            return Err(AppError::Input(format!(
                "Negative standard concentration {concentration} in column `{standards_column}` (line {})",
                row.line
            )));
        }

        points.push(CalibrationPoint {
            concentration,
            response,
        });
    }

    if dropped > 0 {
        debug!("Dropped {dropped} row(s) with missing values");
    }

    if points.is_empty() {
        return Err(AppError::Input(
            "No complete calibration rows remain after removing missing values.".to_string(),
        ));
    }

    CalibrationDataset::new(points).map_err(AppError::Input)
}

#[derive(Debug)]
struct RawRow {
    line: u64,
    record: StringRecord,
}

impl RawRow {
    fn field(&self, idx: usize) -> &str {
        self.record.get(idx).unwrap_or("")
    }
}

/// Header + data rows after the header offset, row limit and skip were applied.
#[derive(Debug)]
struct RawTable {
    headers: Vec<String>,
    /// Per-column flag: `true` when every data value in the column is missing.
    empty_columns: Vec<bool>,
    rows: Vec<RawRow>,
}

impl RawTable {
    fn read<R: Read>(reader: R, options: &ImportOptions) -> Result<Self, AppError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(options.delimiter)
            .from_reader(reader);

        let mut lines = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| AppError::Input(format!("Failed to parse input: {e}")))?;
            if is_blank_line(&record) {
                continue;
            }
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            lines.push(RawRow { line, record });
        }

        let mut lines = lines.into_iter().skip(options.header_row);
        let header = lines.next().ok_or_else(|| {
            AppError::Input(format!(
                "Header row {} is past the end of the input",
                options.header_row
            ))
        })?;

        let headers: Vec<String> = header
            .record
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                if idx == 0 {
                    // Spreadsheet exports sometimes prefix the first header with a BOM.
                    name.trim_start_matches('\u{feff}').to_string()
                } else {
                    name.to_string()
                }
            })
            .collect();

        let rows: Vec<RawRow> = lines
            .take(options.max_rows.unwrap_or(usize::MAX))
            .skip(options.skip_rows.unwrap_or(0))
            .collect();

        let empty_columns = (0..headers.len())
            .map(|idx| rows.iter().all(|r| is_missing(r.field(idx))))
            .collect();

        Ok(Self {
            headers,
            empty_columns,
            rows,
        })
    }

    /// Index of the first non-empty column called `name`.
    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .enumerate()
            .find(|(idx, header)| header.as_str() == name && !self.empty_columns[*idx])
            .map(|(idx, _)| idx)
    }

    fn require_column(&self, name: &str, role: &'static str) -> Result<usize, AppError> {
        self.column_index(name).ok_or_else(|| AppError::ColumnNotFound {
            column: name.to_string(),
            role,
            available: self.available_columns(),
        })
    }

    fn available_columns(&self) -> String {
        let names: Vec<String> = self
            .headers
            .iter()
            .zip(&self.empty_columns)
            .filter(|(_, empty)| !**empty)
            .map(|(name, _)| format!("`{name}`"))
            .collect();
        if names.is_empty() {
            "(none)".to_string()
        } else {
            names.join(", ")
        }
    }
}

fn is_blank_line(record: &StringRecord) -> bool {
    record.len() == 0 || (record.len() == 1 && record[0].trim().is_empty())
}

fn is_missing(raw: &str) -> bool {
    let raw = raw.trim();
    raw.is_empty() || MISSING_TOKENS.contains(&raw)
}

fn parse_number(raw: &str, column: &str, line: u64) -> Result<f64, AppError> {
    let value: f64 = raw.trim().parse().map_err(|_| {
        AppError::Input(format!(
            "Non-numeric value `{}` in column `{column}` (line {line})",
            raw.trim()
        ))
    })?;
    if !value.is_finite() {
        return Err(AppError::Input(format!(
            "Non-finite value `{}` in column `{column}` (line {line})",
            raw.trim()
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLATE_EXPORT: &str = "\
Plate reader export
Run,42
Gain,100

Well,Standard Concentrations, Blank corrected,Notes,
A1,0.5,12.1,,
A2,1.0,24.3,,
A3,2.0,47.9,rerun,
A4,,50.0,,
A5,4.0,,,
A6,8.0,190.2,,
";

    fn options(header_row: usize) -> ImportOptions {
        ImportOptions {
            header_row,
            ..ImportOptions::default()
        }
    }

    #[test]
    fn imports_after_preamble_and_drops_incomplete_rows() {
        let ds = import_from_reader(
            PLATE_EXPORT.as_bytes(),
            " Blank corrected",
            "Standard Concentrations",
            &options(3),
        )
        .unwrap();

        assert_eq!(ds.len(), 4);
        assert_eq!(ds.concentrations(), vec![0.5, 1.0, 2.0, 8.0]);
        assert_eq!(ds.responses(), vec![12.1, 24.3, 47.9, 190.2]);
    }

    #[test]
    fn import_is_deterministic() {
        let a = import_from_reader(PLATE_EXPORT.as_bytes(), " Blank corrected", "Standard Concentrations", &options(3))
            .unwrap();
        let b = import_from_reader(PLATE_EXPORT.as_bytes(), " Blank corrected", "Standard Concentrations", &options(3))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn header_names_are_matched_exactly() {
        // The response header carries a leading space.
        let err = import_from_reader(
            PLATE_EXPORT.as_bytes(),
            "Blank corrected",
            "Standard Concentrations",
            &options(3),
        )
        .unwrap_err();
        match err {
            AppError::ColumnNotFound { column, role, .. } => {
                assert_eq!(column, "Blank corrected");
                assert_eq!(role, "response");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_standards_column_is_a_column_error() {
        let err = import_from_reader(PLATE_EXPORT.as_bytes(), " Blank corrected", "Conc", &options(3)).unwrap_err();
        assert!(matches!(err, AppError::ColumnNotFound { ref role, .. } if *role == "standard concentrations"));
    }

    #[test]
    fn entirely_empty_column_counts_as_absent() {
        let csv = "conc,resp,blank\n1,2,\n2,4,\n";
        let err = import_from_reader(csv.as_bytes(), "blank", "conc", &ImportOptions::default()).unwrap_err();
        assert!(matches!(err, AppError::ColumnNotFound { .. }));
    }

    #[test]
    fn max_rows_then_skip_rows() {
        let csv = "conc,resp\n1,10\n2,20\n3,30\n4,40\n5,50\n";
        let opts = ImportOptions {
            max_rows: Some(4),
            skip_rows: Some(1),
            ..ImportOptions::default()
        };
        let ds = import_from_reader(csv.as_bytes(), "resp", "conc", &opts).unwrap();
        assert_eq!(ds.concentrations(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn non_numeric_value_names_column_and_line() {
        let csv = "conc,resp\n1,10\n2,oops\n";
        let err = import_from_reader(csv.as_bytes(), "resp", "conc", &ImportOptions::default()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("`oops`"));
        assert!(msg.contains("`resp`"));
        assert!(msg.contains("line 3"));
    }

    #[test]
    fn missing_tokens_are_dropped_like_blanks() {
        let csv = "conc,resp\n1,10\nNA,20\n3,NaN\n4,40\n";
        let ds = import_from_reader(csv.as_bytes(), "resp", "conc", &ImportOptions::default()).unwrap();
        assert_eq!(ds.concentrations(), vec![1.0, 4.0]);
    }

    #[test]
    fn spreadsheet_error_markers_are_missing() {
        let csv = "conc,resp\n1,10\n2,#N/A\n<NA>,30\n4,n/a\n5,-NaN\n6,1.#QNAN\n7,70\n";
        let ds = import_from_reader(csv.as_bytes(), "resp", "conc", &ImportOptions::default()).unwrap();
        assert_eq!(ds.concentrations(), vec![1.0, 7.0]);
    }

    #[test]
    fn negative_concentration_is_rejected() {
        let csv = "conc,resp\n1,10\n-2,20\n";
        let err = import_from_reader(csv.as_bytes(), "resp", "conc", &ImportOptions::default()).unwrap_err();
        assert!(err.to_string().contains("Negative"));
    }

    #[test]
    fn empty_after_cleaning_is_an_input_error() {
        let csv = "conc,resp\n1,\n,2\n";
        let err = import_from_reader(csv.as_bytes(), "resp", "conc", &ImportOptions::default()).unwrap_err();
        assert!(matches!(err, AppError::Input(_)));
    }

    #[test]
    fn same_column_for_both_roles_is_rejected() {
        let csv = "conc,resp\n1,2\n";
        let err = import_from_reader(csv.as_bytes(), "conc", "conc", &ImportOptions::default()).unwrap_err();
        assert!(matches!(err, AppError::Input(_)));
    }

    #[test]
    fn header_past_end_is_reported() {
        let csv = "conc,resp\n1,2\n";
        let err = import_from_reader(csv.as_bytes(), "resp", "conc", &options(10)).unwrap_err();
        assert!(err.to_string().contains("Header row 10"));
    }

    #[test]
    fn bom_prefixed_first_header_is_found() {
        let csv = "\u{feff}conc,resp\n1,2\n";
        let ds = import_from_reader(csv.as_bytes(), "resp", "conc", &ImportOptions::default()).unwrap();
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn semicolon_delimiter() {
        let csv = "conc;resp\n1;2\n3;4\n";
        let opts = ImportOptions {
            delimiter: b';',
            ..ImportOptions::default()
        };
        let ds = import_from_reader(csv.as_bytes(), "resp", "conc", &opts).unwrap();
        assert_eq!(ds.responses(), vec![2.0, 4.0]);
    }
}
