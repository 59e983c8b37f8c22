use std::path::Path;

use tracing::debug;

use super::{IngestError, Sheet, SheetReader};

/// Tabular source reader for CSV files.
///
/// The first record is treated as the header row; remaining records become
/// data rows. Records are allowed to have uneven lengths, matching how
/// spreadsheet exports trail off on sparse rows.
pub struct CsvSheetReader;

impl SheetReader for CsvSheetReader {
    fn read_sheet(&self, path: &Path) -> Result<Sheet, IngestError> {
        let read_error = |source: csv::Error| IngestError::Read {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(read_error)?;

        let mut records = reader.records();

        let header = match records.next() {
            Some(record) => record
                .map_err(read_error)?
                .iter()
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        };

        let mut rows = Vec::new();
        for record in records {
            let record = record.map_err(read_error)?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        debug!(path = %path.display(), rows = rows.len(), "sheet loaded");
        Ok(Sheet { header, rows })
    }
}
