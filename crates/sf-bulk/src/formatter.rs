//! CSV formatting of records for ingest uploads.

use serde_json::Value;

use sforce_client::HasFields;

use crate::error::{Error, Result};
use crate::job::Job;
use crate::types::{ColumnDelimiter, LineEnding};

/// Cell value that tells the server to set a field to null.
pub const NULL_SENTINEL: &str = "#N/A";

/// Builds one upload body for one job.
///
/// The header row is written on construction. Each [`CsvFormatter::add`]
/// appends rows whose cells follow the field order given at construction;
/// keys a record has beyond those fields are ignored. A missing field is
/// written as `#N/A` when `insert_null` is set and as an empty cell (which the
/// server ignores) otherwise.
#[derive(Debug, Clone)]
pub struct CsvFormatter {
    fields: Vec<String>,
    delimiter: ColumnDelimiter,
    line_ending: LineEnding,
    insert_null: bool,
    header: Vec<u8>,
    buffer: Vec<u8>,
    rows: usize,
}

impl CsvFormatter {
    /// A formatter using the job's delimiter and line ending.
    pub fn new<I>(job: &Job, fields: I, insert_null: bool) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let info = job.details();
        Self::with_format(
            info.format.column_delimiter,
            info.format.line_ending,
            fields,
            insert_null,
        )
    }

    /// A formatter with an explicit delimiter and line ending.
    pub fn with_format<I>(
        delimiter: ColumnDelimiter,
        line_ending: LineEnding,
        fields: I,
        insert_null: bool,
    ) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(Error::validation("CSV formatter needs at least one field"));
        }
        if let Some(blank) = fields.iter().find(|f| f.trim().is_empty()) {
            return Err(Error::validation(format!("invalid CSV field name {blank:?}")));
        }

        let mut formatter = Self {
            fields,
            delimiter,
            line_ending,
            insert_null,
            header: Vec::new(),
            buffer: Vec::new(),
            rows: 0,
        };
        formatter.header = formatter.encode(formatter.fields.iter().map(String::as_str))?;
        formatter.buffer = formatter.header.clone();
        Ok(formatter)
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// Data rows added so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Header row without its line ending.
    pub fn header(&self) -> &[u8] {
        strip_line_ending(&self.header, self.line_ending)
    }

    /// Append one row per record.
    pub fn add<'a, R, I>(&mut self, records: I) -> Result<()>
    where
        R: HasFields + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        for record in records {
            let row = self.encode_record(record)?;
            self.buffer.extend_from_slice(&row);
            self.rows += 1;
        }
        Ok(())
    }

    /// The row `record` would produce, without its line ending.
    pub fn row_string<R: HasFields>(&self, record: &R) -> Result<String> {
        let row = self.encode_record(record)?;
        let row = strip_line_ending(&row, self.line_ending);
        String::from_utf8(row.to_vec()).map_err(|e| Error::validation(e.to_string()))
    }

    /// Everything written so far, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    fn encode_record<R: HasFields>(&self, record: &R) -> Result<Vec<u8>> {
        let values = record.fields();
        let cells: Vec<String> = self
            .fields
            .iter()
            .map(|field| match values.get(field) {
                None | Some(Value::Null) if self.insert_null => NULL_SENTINEL.to_string(),
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(Value::Bool(b)) => b.to_string(),
                Some(Value::Number(n)) => n.to_string(),
                Some(other) => other.to_string(),
            })
            .collect();
        self.encode(cells.iter().map(String::as_str))
    }

    fn encode<'a>(&self, cells: impl Iterator<Item = &'a str>) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter.byte())
            .terminator(self.line_ending.terminator())
            .from_writer(Vec::new());
        writer.write_record(cells)?;
        writer
            .into_inner()
            .map_err(|e| Error::from(e.into_error()))
    }
}

fn strip_line_ending(row: &[u8], line_ending: LineEnding) -> &[u8] {
    row.strip_suffix(line_ending.as_str().as_bytes())
        .unwrap_or(row)
}
