// 📄 Record Parser - CSV text → BatchRecord stream
// Header is validated once up front; rows are decoded lazily.

use crate::config::RunConfig;
use crate::error::{ErrorKind, RecordError, RunFatalError};
use std::io::Read;
use tracing::warn;

const UTF8_BOM: char = '\u{feff}';

// ============================================================================
// COLUMN SCHEMA
// ============================================================================

/// Ordered column names a job expects in the header row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    columns: Vec<&'static str>,
}

impl ColumnSchema {
    pub fn new(columns: &[&'static str]) -> Self {
        ColumnSchema {
            columns: columns.to_vec(),
        }
    }

    pub fn columns(&self) -> &[&'static str] {
        &self.columns
    }

    /// Header row as it should appear in an input file
    pub fn header_line(&self, delimiter: char) -> String {
        self.columns.join(&delimiter.to_string())
    }

    /// Positional comparison against an already-cleaned header row.
    /// Trailing extra columns are ignored.
    pub fn check(&self, actual: &[String], case_insensitive: bool) -> Result<(), RunFatalError> {
        for (i, expected) in self.columns.iter().enumerate() {
            let found = actual.get(i).map(|s| s.as_str());
            match found {
                Some(name) if name == *expected => {}
                Some(name) if case_insensitive && name.eq_ignore_ascii_case(expected) => {
                    warn!(
                        position = i + 1,
                        expected = *expected,
                        actual = name,
                        "Header matches only case-insensitively"
                    );
                }
                other => {
                    return Err(RunFatalError::SchemaMismatch {
                        position: i + 1,
                        expected: expected.to_string(),
                        actual: other.unwrap_or("<missing>").to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// BATCH RECORD
// ============================================================================

/// One parsed data row, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRecord {
    /// 1-based record sequence number
    pub index: usize,
    /// Line in the input where the row starts
    pub line: u64,
    values: Vec<(&'static str, String)>,
}

impl BatchRecord {
    pub fn new(index: usize, line: u64, values: Vec<(&'static str, String)>) -> Self {
        BatchRecord {
            index,
            line,
            values,
        }
    }

    /// Cleaned value for a declared column
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value.as_str())
    }
}

// ============================================================================
// PARSER
// ============================================================================

/// Lazy, single-pass iterator over the data rows of one input
pub struct RecordParser<R: Read> {
    reader: csv::Reader<R>,
    schema: ColumnSchema,
    config: RunConfig,
    row: csv::StringRecord,
    index: usize,
    done: bool,
}

impl<R: Read> std::fmt::Debug for RecordParser<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordParser")
            .field("schema", &self.schema)
            .field("index", &self.index)
            .field("done", &self.done)
            .finish()
    }
}

impl<R: Read> RecordParser<R> {
    /// Read and validate the header row. Any mismatch aborts the run.
    pub fn new(input: R, schema: ColumnSchema, config: &RunConfig) -> Result<Self, RunFatalError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(config.delimiter as u8)
            .from_reader(input);

        let header: Vec<String> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let cell = if i == 0 {
                    cell.trim_start_matches(UTF8_BOM)
                } else {
                    cell
                };
                config.clean_header(cell)
            })
            .collect();

        schema.check(&header, config.case_insensitive_headers)?;

        Ok(RecordParser {
            reader,
            schema,
            config: config.clone(),
            row: csv::StringRecord::new(),
            index: 0,
            done: false,
        })
    }

    /// Records yielded so far
    pub fn records_read(&self) -> usize {
        self.index
    }

    fn build_record(&self) -> BatchRecord {
        let line = self.row.position().map(|p| p.line()).unwrap_or(0);
        let values = self
            .schema
            .columns()
            .iter()
            .enumerate()
            .map(|(i, column)| {
                // Short rows are padded with blanks
                let raw = self.row.get(i).unwrap_or("");
                (*column, self.config.clean_value(raw))
            })
            .collect();
        BatchRecord::new(self.index, line, values)
    }
}

impl<R: Read> Iterator for RecordParser<R> {
    type Item = Result<BatchRecord, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.reader.read_record(&mut self.row) {
            Ok(false) => {
                self.done = true;
                None
            }
            Ok(true) => {
                self.index += 1;
                Some(Ok(self.build_record()))
            }
            Err(e) => {
                self.index += 1;
                // The reader cannot make progress past an I/O failure
                if e.is_io_error() {
                    self.done = true;
                }
                Some(Err(RecordError::new(
                    ErrorKind::MalformedRow,
                    format!("record {}: {}", self.index, e),
                )))
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn schema() -> ColumnSchema {
        ColumnSchema::new(&["eventDetectorId", "eventDetectorXid", "newLimit"])
    }

    fn parse(input: &str) -> Result<Vec<Result<BatchRecord, RecordError>>, RunFatalError> {
        let parser = RecordParser::new(input.as_bytes(), schema(), &RunConfig::default())?;
        Ok(parser.collect())
    }

    #[test]
    fn test_parse_valid_rows() {
        let records = parse("eventDetectorId,eventDetectorXid,newLimit\n1,ED_1,5.5\n2,ED_2,EMPTY\n")
            .unwrap();
        assert_eq!(records.len(), 2);

        let first = records[0].as_ref().unwrap();
        assert_eq!(first.index, 1);
        assert_eq!(first.get("eventDetectorXid"), Some("ED_1"));
        assert_eq!(first.get("newLimit"), Some("5.5"));
        assert_eq!(first.get("unknown"), None);

        let second = records[1].as_ref().unwrap();
        assert_eq!(second.index, 2);
        assert_eq!(second.line, 3);
        assert_eq!(second.get("newLimit"), Some("EMPTY"));
    }

    #[test]
    fn test_header_mismatch_is_fatal() {
        let err = parse("eventDetectorId,xid,newLimit\n1,ED_1,5\n").unwrap_err();
        match err {
            RunFatalError::SchemaMismatch {
                position,
                expected,
                actual,
            } => {
                assert_eq!(position, 2);
                assert_eq!(expected, "eventDetectorXid");
                assert_eq!(actual, "xid");
            }
            other => panic!("expected SchemaMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_header_column_is_fatal() {
        let err = parse("eventDetectorId,eventDetectorXid\n1,ED_1\n").unwrap_err();
        assert!(matches!(
            err,
            RunFatalError::SchemaMismatch { position: 3, ref actual, .. } if actual == "<missing>"
        ));
    }

    #[test]
    fn test_header_cleanup_and_case() {
        // BOM, quotes, inner spaces and different case are all tolerated
        let input = "\u{feff}\"event Detector Id\",EVENTDETECTORXID, newLimit ,extra\n1,ED_1,2\n";
        let records = parse(input).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].as_ref().unwrap().get("eventDetectorId"), Some("1"));
    }

    #[test]
    fn test_case_sensitive_headers_when_configured() {
        let mut config = RunConfig::default();
        config.case_insensitive_headers = false;
        let input = "EVENTDETECTORID,eventDetectorXid,newLimit\n";
        let err = RecordParser::new(input.as_bytes(), schema(), &config).unwrap_err();
        assert!(matches!(err, RunFatalError::SchemaMismatch { position: 1, .. }));
    }

    #[test]
    fn test_values_are_cleaned_and_padded() {
        let records = parse("eventDetectorId,eventDetectorXid,newLimit\n 3 ,'ED_3'\n").unwrap();
        let record = records[0].as_ref().unwrap();
        assert_eq!(record.get("eventDetectorId"), Some("3"));
        assert_eq!(record.get("eventDetectorXid"), Some("ED_3"));
        assert_eq!(record.get("newLimit"), Some(""));
    }

    #[test]
    fn test_header_only_yields_nothing() {
        let records = parse("eventDetectorId,eventDetectorXid,newLimit\n").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_semicolon_delimiter() {
        let config = RunConfig::default().with_delimiters(';', '|');
        let input = "eventDetectorId;eventDetectorXid;newLimit\n1;ED_1;4\n";
        let parser = RecordParser::new(input.as_bytes(), schema(), &config).unwrap();
        let records: Vec<_> = parser.collect();
        assert_eq!(records[0].as_ref().unwrap().get("newLimit"), Some("4"));
    }

    #[test]
    fn test_invalid_utf8_row_is_record_scoped() {
        let mut input = b"eventDetectorId,eventDetectorXid,newLimit\n".to_vec();
        input.extend_from_slice(b"1,ED_\xff,5\n2,ED_2,6\n");
        let parser = RecordParser::new(input.as_slice(), schema(), &RunConfig::default()).unwrap();
        let records: Vec<_> = parser.collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].as_ref().unwrap_err().kind, ErrorKind::MalformedRow);
        assert_eq!(records[1].as_ref().unwrap().get("eventDetectorXid"), Some("ED_2"));
    }
}
