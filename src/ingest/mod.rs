//! Turning a tabular source into the ordered company list a job works on.

use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod sheet;

pub use sheet::CsvSheetReader;

/// First sheet of a tabular source, every cell stringified.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read source {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("could not find a column named \"Company\" in the source file")]
    MissingCompanyColumn,
}

/// Reads the first sheet of a tabular source as header + rows.
pub trait SheetReader: Send + Sync {
    fn read_sheet(&self, path: &Path) -> Result<Sheet, IngestError>;
}

/// Locate the company column and collect its non-empty cells in row order.
///
/// The column is the first header cell whose lowercased value contains the
/// substring "company". Rows missing that cell, or carrying an empty one,
/// contribute nothing rather than a placeholder.
pub fn extract_companies(sheet: &Sheet) -> Result<Vec<String>, IngestError> {
    let column = sheet
        .header
        .iter()
        .position(|cell| cell.to_lowercase().contains("company"))
        .ok_or(IngestError::MissingCompanyColumn)?;

    Ok(sheet
        .rows
        .iter()
        .filter_map(|row| row.get(column))
        .filter(|cell| !cell.is_empty())
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(header: &[&str], rows: &[&[&str]]) -> Sheet {
        Sheet {
            header: header.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn finds_company_column_by_substring() {
        let sheet = sheet(
            &["Id", "Company Name", "Country"],
            &[
                &["1", "Acme Corp", "US"],
                &["2", "Globex", "DE"],
            ],
        );

        let companies = extract_companies(&sheet).expect("column present");
        assert_eq!(companies, vec!["Acme Corp", "Globex"]);
    }

    #[test]
    fn header_match_is_case_insensitive() {
        let sheet = sheet(&["COMPANY"], &[&["Initech"]]);
        assert_eq!(extract_companies(&sheet).unwrap(), vec!["Initech"]);
    }

    #[test]
    fn missing_column_is_an_error() {
        let sheet = sheet(&["Name", "Country"], &[&["Acme", "US"]]);
        assert!(matches!(
            extract_companies(&sheet),
            Err(IngestError::MissingCompanyColumn)
        ));
    }

    #[test]
    fn empty_and_missing_cells_are_skipped() {
        let sheet = sheet(
            &["Company", "Country"],
            &[
                &["Acme", "US"],
                &["", "DE"],
                &[],
                &["Globex", "FR"],
            ],
        );

        let companies = extract_companies(&sheet).unwrap();
        assert_eq!(companies, vec!["Acme", "Globex"]);
    }
}
