use csv::ReaderBuilder;
use std::collections::HashMap;
use tracing::debug;

use crate::domain::Row;
use crate::error::ParseError;
use crate::pipeline::processing::normalize::canonical_column_name;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Header-defined rows read from an uploaded file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTable {
    /// Header names exactly as they appear in the file (whitespace aside).
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl ParsedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

pub trait TableParser {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedTable, ParseError>;
}

/// Strict CSV reader: a header row is mandatory and every record must
/// carry exactly as many fields as the header.
pub struct CsvParser {
    delimiter: u8,
}

impl CsvParser {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TableParser for CsvParser {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedTable, ParseError> {
        let data = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .delimiter(self.delimiter)
            .from_reader(data);

        let headers: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if headers.is_empty() {
            return Err(ParseError::MissingHeader);
        }
        check_headers(&headers)?;

        let mut rows = Vec::new();
        for (index, result) in rdr.records().enumerate() {
            let record = result?;
            let fields = headers
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect();
            rows.push(Row { index, fields });
        }

        debug!(columns = headers.len(), rows = rows.len(), "parsed CSV");
        Ok(ParsedTable { headers, rows })
    }
}

/// Every header needs a non-empty canonical form, and no two may share one.
fn check_headers(headers: &[String]) -> Result<(), ParseError> {
    let mut seen: HashMap<String, &str> = HashMap::with_capacity(headers.len());
    for (position, header) in headers.iter().enumerate() {
        let canonical = canonical_column_name(header);
        if canonical.is_empty() {
            return Err(ParseError::EmptyColumnName { position });
        }
        if let Some(first) = seen.insert(canonical.clone(), header) {
            return Err(ParseError::DuplicateColumn {
                first: first.to_string(),
                second: header.clone(),
                canonical,
            });
        }
    }
    Ok(())
}
