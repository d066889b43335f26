//! Streaming CSV row reader.
//!
//! Rows are yielded lazily in file order as flat `column -> value` maps.
//! Nothing product-specific happens here except checking that the handle
//! column exists.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use crate::error::{CsvError, CsvResult};

/// The only column every export must carry.
pub const HANDLE_COLUMN: &str = "Handle";

/// One data row of the export.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    line: u64,
    fields: HashMap<String, String>,
}

impl RawRow {
    pub fn new(line: u64, fields: HashMap<String, String>) -> Self {
        Self { line, fields }
    }

    /// Trimmed value of a column, empty when the column is absent.
    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(|v| v.trim()).unwrap_or("")
    }

    /// 1-based line number in the source file.
    pub fn line(&self) -> u64 {
        self.line
    }
}

/// Lazy, single-pass iterator over the rows of a CSV export.
///
/// One record is read ahead so that a quoted field left open at the end of
/// the file is reported instead of silently absorbing the remaining rows.
pub struct RowReader<R: Read> {
    headers: Vec<String>,
    records: csv::StringRecordsIntoIter<QuoteTracker<BufReader<R>>>,
    peeked: Option<csv::Result<csv::StringRecord>>,
    rows_read: usize,
}

impl RowReader<File> {
    /// Open a CSV file. Fails if the file cannot be opened or the header is
    /// unusable; data rows are not touched yet.
    pub fn from_path<P: AsRef<Path>>(path: P) -> CsvResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| CsvError::File {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }
}

impl<R: Read> RowReader<R> {
    /// Wrap any byte stream. The delimiter is sniffed from the header line.
    pub fn from_reader(reader: R) -> CsvResult<Self> {
        let mut buf = BufReader::new(reader);
        let delimiter = {
            let peeked = buf.fill_buf().map_err(|e| CsvError::Parse {
                line: 1,
                message: format!("Cannot read header: {}", e),
            })?;
            if peeked.is_empty() {
                return Err(CsvError::EmptyFile);
            }
            detect_delimiter(peeked)
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_reader(QuoteTracker::new(buf, delimiter));

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(CsvError::EmptyFile);
        }
        if !headers.iter().any(|h| h == HANDLE_COLUMN) {
            return Err(CsvError::MissingColumn(HANDLE_COLUMN.to_string()));
        }

        let mut records = reader.into_records();
        let peeked = records.next();
        if peeked.is_none() {
            if let Some(line) = records.reader().get_ref().unclosed_quote() {
                return Err(unterminated_quote(line));
            }
        }

        Ok(Self {
            headers,
            records,
            peeked,
            rows_read: 0,
        })
    }

    /// Column headers as they appear in the file.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of data rows yielded so far.
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }
}

impl<R: Read> Iterator for RowReader<R> {
    type Item = CsvResult<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.peeked.take()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e.into())),
        };

        self.peeked = self.records.next();
        if self.peeked.is_none() {
            if let Some(line) = self.records.reader().get_ref().unclosed_quote() {
                return Some(Err(unterminated_quote(line)));
            }
        }
        self.rows_read += 1;

        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let fields = self
            .headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();

        Some(Ok(RawRow::new(line, fields)))
    }
}

fn unterminated_quote(line: u64) -> CsvError {
    CsvError::Parse {
        line,
        message: "unterminated quoted field".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Follows the quoting state of the bytes handed to the CSV parser.
///
/// The `csv` crate closes an open quote at EOF without complaint, so the
/// state is tracked here with the same rules it applies: a quote opens a
/// field only at the start of the field, and `""` inside a quoted field is
/// an escaped quote.
struct QuoteTracker<R> {
    inner: R,
    delimiter: u8,
    state: QuoteState,
    line: u64,
    quote_line: u64,
    eof: bool,
}

impl<R: Read> QuoteTracker<R> {
    fn new(inner: R, delimiter: u8) -> Self {
        Self {
            inner,
            delimiter,
            state: QuoteState::FieldStart,
            line: 1,
            quote_line: 1,
            eof: false,
        }
    }

    /// Line on which the open quote started, once the input ended inside it.
    fn unclosed_quote(&self) -> Option<u64> {
        (self.eof && self.state == QuoteState::Quoted).then_some(self.quote_line)
    }

    fn feed(&mut self, byte: u8) {
        let terminator = byte == b'\n' || byte == b'\r';
        self.state = match self.state {
            QuoteState::FieldStart | QuoteState::Unquoted | QuoteState::QuoteInQuoted
                if byte == self.delimiter || terminator =>
            {
                QuoteState::FieldStart
            }
            QuoteState::FieldStart if byte == b'"' => {
                self.quote_line = self.line;
                QuoteState::Quoted
            }
            QuoteState::FieldStart | QuoteState::Unquoted => QuoteState::Unquoted,
            QuoteState::Quoted if byte == b'"' => QuoteState::QuoteInQuoted,
            QuoteState::Quoted => QuoteState::Quoted,
            QuoteState::QuoteInQuoted if byte == b'"' => QuoteState::Quoted,
            QuoteState::QuoteInQuoted => QuoteState::Unquoted,
        };
        if byte == b'\n' {
            self.line += 1;
        }
    }
}

impl<R: Read> Read for QuoteTracker<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.eof = true;
        }
        for &byte in &buf[..n] {
            self.feed(byte);
        }
        Ok(n)
    }
}

/// Pick the delimiter by counting candidates in the first line.
/// Comma wins ties, since that is what Shopify writes.
pub fn detect_delimiter(head: &[u8]) -> u8 {
    let first_line = head.split(|&b| b == b'\n').next().unwrap_or(&[]);

    let mut best = b',';
    let mut best_count = first_line.iter().filter(|&&b| b == b',').count();

    for sep in [b';', b'\t', b'|'] {
        let count = first_line.iter().filter(|&&b| b == sep).count();
        if count > best_count {
            best_count = count;
            best = sep;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(csv: &str) -> CsvResult<Vec<RawRow>> {
        RowReader::from_reader(csv.as_bytes())?.collect()
    }

    #[test]
    fn test_rows_in_file_order() {
        let rows = rows("Handle,Title\na,Alpha\nb,Beta\n").unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Handle"), "a");
        assert_eq!(rows[0].get("Title"), "Alpha");
        assert_eq!(rows[1].get("Handle"), "b");
        assert_eq!(rows[1].line(), 3);
    }

    #[test]
    fn test_quoted_fields_with_delimiters() {
        let csv = "Handle,Body (HTML)\nshirt,\"<p>Soft, warm</p>\"\n";
        let rows = rows(csv).unwrap();
        assert_eq!(rows[0].get("Body (HTML)"), "<p>Soft, warm</p>");
    }

    #[test]
    fn test_absent_column_reads_empty() {
        let rows = rows("Handle\na\n").unwrap();
        assert_eq!(rows[0].get("Variant SKU"), "");
    }

    #[test]
    fn test_values_are_trimmed() {
        let rows = rows("Handle,Title\n  a  , Alpha \n").unwrap();
        assert_eq!(rows[0].get("Handle"), "a");
        assert_eq!(rows[0].get("Title"), "Alpha");
    }

    #[test]
    fn test_bom_stripped_from_header() {
        let rows = rows("\u{feff}Handle,Title\na,Alpha\n").unwrap();
        assert_eq!(rows[0].get("Handle"), "a");
    }

    #[test]
    fn test_column_count_mismatch_is_parse_error() {
        let err = rows("Handle,Title\na,Alpha,extra\n").unwrap_err();
        match err {
            CsvError::Parse { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("expected 2 fields"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_quote_is_parse_error() {
        let err = rows("Handle,Title\na,\"Alpha\nb,Beta\n").unwrap_err();
        match err {
            CsvError::Parse { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("unterminated"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_quote_after_valid_rows() {
        let mut reader = RowReader::from_reader("Handle,Title\na,Alpha\nb,\"Beta\nc,Gamma\n".as_bytes()).unwrap();

        let first = reader.next().unwrap().unwrap();
        assert_eq!(first.get("Handle"), "a");
        assert!(matches!(reader.next(), Some(Err(CsvError::Parse { line: 3, .. }))));
    }

    #[test]
    fn test_unterminated_quote_in_header() {
        let result = RowReader::from_reader("Handle,\"Title\na,Alpha\n".as_bytes());
        assert!(matches!(result, Err(CsvError::Parse { line: 1, .. })));
    }

    #[test]
    fn test_escaped_and_embedded_quotes_are_not_unterminated() {
        let csv = "Handle,Title,Body (HTML)\nscreen,5\" monitor,\"<p>Say \"\"hi\"\"\nthere</p>\"\n";
        let rows = rows(csv).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Title"), "5\" monitor");
        assert_eq!(rows[0].get("Body (HTML)"), "<p>Say \"hi\"\nthere</p>");
    }

    #[test]
    fn test_missing_handle_column() {
        let result = RowReader::from_reader("Title,Vendor\nA,B\n".as_bytes());
        assert!(matches!(result, Err(CsvError::MissingColumn(c)) if c == "Handle"));
    }

    #[test]
    fn test_empty_input() {
        let result = RowReader::from_reader("".as_bytes());
        assert!(matches!(result, Err(CsvError::EmptyFile)));
    }

    #[test]
    fn test_missing_file_is_file_error() {
        let result = RowReader::from_path("/definitely/not/here.csv");
        assert!(matches!(result, Err(CsvError::File { .. })));
    }

    #[test]
    fn test_rows_read_counter() {
        let mut reader = RowReader::from_reader("Handle\na\n\nb\n".as_bytes()).unwrap();
        assert_eq!(reader.rows_read(), 0);
        reader.next();
        assert_eq!(reader.rows_read(), 1);
        reader.next();
        assert!(reader.next().is_none());
        assert_eq!(reader.rows_read(), 2);
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter(b"Handle,Title,Vendor\n"), b',');
        assert_eq!(detect_delimiter(b"Handle;Title;Vendor\n"), b';');
        assert_eq!(detect_delimiter(b"Handle\tTitle\n"), b'\t');
        assert_eq!(detect_delimiter(b"Handle\n"), b',');
    }
}
