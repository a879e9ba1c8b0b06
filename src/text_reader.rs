//! Streaming reader that turns delimited text into bounded row batches

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, StringBuilder};
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use log::{debug, warn};

use crate::error::{Error, Result};
use crate::schema_inference::InferredSchema;

/// A bounded group of rows, each holding exactly `column_count` optional fields.
/// `None` marks a field missing from a short row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowBatch {
    column_count: usize,
    rows: Vec<Vec<Option<String>>>,
}

impl RowBatch {
    pub fn new(column_count: usize) -> Self {
        Self {
            column_count,
            rows: Vec::new(),
        }
    }

    /// Build a batch from rows that already have `column_count` fields
    pub fn from_rows(column_count: usize, rows: Vec<Vec<Option<String>>>) -> Self {
        let mut batch = Self::new(column_count);
        for row in rows {
            batch.push_row(row);
        }
        batch
    }

    /// Append a row, null-filling short rows and cutting long ones.
    /// Returns the number of fields dropped.
    pub fn push_row(&mut self, mut row: Vec<Option<String>>) -> usize {
        let dropped = row.len().saturating_sub(self.column_count);
        row.resize(self.column_count, None);
        self.rows.push(row);
        dropped
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    /// Transpose into an Arrow batch with one Utf8 column per field
    pub fn to_record_batch(&self, schema: &SchemaRef) -> std::result::Result<RecordBatch, ArrowError> {
        let columns: Vec<ArrayRef> = (0..self.column_count)
            .map(|col_idx| {
                let mut builder = StringBuilder::with_capacity(self.rows.len(), self.rows.len() * 8);
                for row in &self.rows {
                    builder.append_option(row[col_idx].as_deref());
                }
                Arc::new(builder.finish()) as ArrayRef
            })
            .collect();

        RecordBatch::try_new(schema.clone(), columns)
    }
}

/// Lazily reads a delimited file in batches of at most `batch_size` rows.
/// Blank and whitespace-only lines are skipped, invalid UTF-8 is replaced rather than rejected.
pub struct RowBatchReader<R: Read> {
    rdr: csv::Reader<R>,
    record: csv::ByteRecord,
    column_count: usize,
    batch_size: usize,
    rows_read: u64,
    batches_read: usize,
    finished: bool,
}

impl RowBatchReader<BufReader<File>> {
    pub fn from_path(path: impl AsRef<Path>, schema: &InferredSchema, batch_size: usize) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file), schema, batch_size)
    }
}

impl<R: Read> RowBatchReader<R> {
    pub fn from_reader(reader: R, schema: &InferredSchema, batch_size: usize) -> Result<Self> {
        if !schema.separator.is_ascii() {
            return Err(Error::Conversion(format!(
                "separator {:?} is not a single byte",
                schema.separator
            )));
        }

        let rdr = csv::ReaderBuilder::new()
            .delimiter(schema.separator as u8)
            .has_headers(false)
            .flexible(true)
            .quote(b'"')
            .double_quote(true)
            .from_reader(reader);

        Ok(Self {
            rdr,
            record: csv::ByteRecord::new(),
            column_count: schema.column_count,
            batch_size: batch_size.max(1),
            rows_read: 0,
            batches_read: 0,
            finished: false,
        })
    }

    /// Total rows handed out so far
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Read the next batch, or `None` once the input is exhausted
    pub fn next_batch(&mut self) -> Result<Option<RowBatch>> {
        if self.finished {
            return Ok(None);
        }

        let mut batch = RowBatch::new(self.column_count);
        let mut truncated_rows = 0usize;

        while batch.num_rows() < self.batch_size {
            let has_record = self
                .rdr
                .read_byte_record(&mut self.record)
                .map_err(|e| Error::Conversion(format!("failed to read row {}: {}", self.rows_read + 1, e)))?;
            if !has_record {
                self.finished = true;
                break;
            }
            if is_blank_record(&self.record) {
                continue;
            }

            let row: Vec<Option<String>> = self
                .record
                .iter()
                .map(|field| Some(String::from_utf8_lossy(field).into_owned()))
                .collect();
            if batch.push_row(row) > 0 {
                truncated_rows += 1;
            }
            self.rows_read += 1;
        }

        if truncated_rows > 0 {
            warn!(
                "Batch {}: {} rows had more than {} fields, extra fields dropped",
                self.batches_read, truncated_rows, self.column_count
            );
        }

        if batch.is_empty() {
            return Ok(None);
        }

        debug!("Read batch {} with {} rows", self.batches_read, batch.num_rows());
        self.batches_read += 1;
        Ok(Some(batch))
    }
}

/// A line holding nothing but whitespace, which inference also skips
fn is_blank_record(record: &csv::ByteRecord) -> bool {
    record.len() == 1 && !record[0].is_empty() && record[0].iter().all(u8::is_ascii_whitespace)
}

impl<R: Read> Iterator for RowBatchReader<R> {
    type Item = Result<RowBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_batch() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
