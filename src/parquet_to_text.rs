//! Parquet to delimited text conversion
//!
//! Batches are rendered column by column and then transposed into lines.
//! Rows are joined by exactly one `\n` and the output has no trailing
//! newline, including across batch boundaries.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, SchemaRef};
use arrow::record_batch::RecordBatch;
use log::{debug, info};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::constants::{COLUMN_COMPRESSION_KEY, DEFAULT_BATCH_SIZE, ORIGINAL_EXTENSION_KEY};
use crate::error::{Error, Result};
use crate::format::TextFormat;

/// Metadata a container carries about its source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerMetadata {
    pub original_extension: Option<String>,
    /// Column name to codec hint
    pub column_hints: BTreeMap<String, String>,
    pub num_rows: u64,
    pub num_row_groups: usize,
}

impl ContainerMetadata {
    /// Original extension, or `fallback` when the container has none
    pub fn extension_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.original_extension.as_deref().unwrap_or(fallback)
    }
}

/// Read the metadata of the container at `path` without decoding any rows
pub fn read_container_metadata(path: impl AsRef<Path>) -> Result<ContainerMetadata> {
    ParquetToTextConverter::new(path).map(|c| c.metadata().clone())
}

/// Escape a field for delimited output. A `"` is only special at the start
/// of a field, so quotes elsewhere are written as-is.
fn escape_text_value(value: &str, sep: char) -> String {
    if value.contains(sep) || value.starts_with('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Convert an entire column to rendered fields. Nulls become empty fields.
/// With `sole_column` set, an empty string is written as `""` so the line is
/// not read back as blank.
fn convert_column_to_strings(array: &ArrayRef, sep: char, sole_column: bool) -> Result<Vec<String>> {
    let utf8 = match array.data_type() {
        DataType::Utf8 => array.clone(),
        other => cast(array, &DataType::Utf8)
            .map_err(|e| Error::Export(format!("cannot render {:?} column as text: {}", other, e)))?,
    };
    let strings = utf8.as_string::<i32>();

    Ok((0..strings.len())
        .map(|i| {
            if strings.is_null(i) {
                String::new()
            } else if sole_column && strings.value(i).is_empty() {
                "\"\"".to_string()
            } else {
                escape_text_value(strings.value(i), sep)
            }
        })
        .collect())
}

/// Render a batch as delimited lines joined by `\n`, without a trailing newline
pub fn record_batch_to_text(batch: &RecordBatch, sep: char) -> Result<String> {
    if batch.num_rows() == 0 {
        return Ok(String::new());
    }

    let num_rows = batch.num_rows();
    let num_cols = batch.num_columns();

    let mut column_strings: Vec<Vec<String>> = Vec::with_capacity(num_cols);
    for col_idx in 0..num_cols {
        column_strings.push(convert_column_to_strings(batch.column(col_idx), sep, num_cols == 1)?);
    }

    let estimated_size = num_rows * num_cols * 16 + num_rows;
    let mut buffer = String::with_capacity(estimated_size);
    for row_idx in 0..num_rows {
        for (col_idx, column) in column_strings.iter().enumerate() {
            if col_idx > 0 {
                buffer.push(sep);
            }
            buffer.push_str(&column[row_idx]);
        }
        buffer.push('\n');
    }

    if buffer.ends_with('\n') {
        buffer.pop();
    }
    Ok(buffer)
}

/// Outcome of one export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportReport {
    pub rows: u64,
    pub batches: usize,
    pub bytes_written: u64,
}

/// Reads a Parquet container and writes it back out as delimited text
#[derive(Debug)]
pub struct ParquetToTextConverter {
    path: PathBuf,
    schema: SchemaRef,
    metadata: ContainerMetadata,
    batch_size: usize,
}

impl ParquetToTextConverter {
    /// Open the container at `path`
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(Error::Export(format!("Parquet file does not exist: {:?}", path)));
        }

        let file = File::open(&path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| Error::Export(format!("failed to open Parquet file: {}", e)))?;

        let parquet_meta = builder.metadata();
        let schema = builder.schema().clone();

        let kv_extension = parquet_meta
            .file_metadata()
            .key_value_metadata()
            .and_then(|kvs| kvs.iter().find(|kv| kv.key == ORIGINAL_EXTENSION_KEY))
            .and_then(|kv| kv.value.clone());
        let original_extension =
            kv_extension.or_else(|| schema.metadata().get(ORIGINAL_EXTENSION_KEY).cloned());

        let column_hints = schema
            .fields()
            .iter()
            .filter_map(|f| {
                f.metadata()
                    .get(COLUMN_COMPRESSION_KEY)
                    .map(|codec| (f.name().clone(), codec.clone()))
            })
            .collect();

        let metadata = ContainerMetadata {
            original_extension,
            column_hints,
            num_rows: parquet_meta.file_metadata().num_rows().max(0) as u64,
            num_row_groups: parquet_meta.num_row_groups(),
        };

        Ok(Self {
            path,
            schema,
            metadata,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Rows per decoded batch
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn len(&self) -> usize {
        self.metadata.num_rows as usize
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.num_rows == 0
    }

    pub fn num_row_groups(&self) -> usize {
        self.metadata.num_row_groups
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn metadata(&self) -> &ContainerMetadata {
        &self.metadata
    }

    /// Export to `output` using the separator of `target_type` (`tbl`, `csv` or `txt`)
    pub fn convert_to_text_as(&self, output: impl AsRef<Path>, target_type: &str) -> Result<ExportReport> {
        let format = TextFormat::from_extension(target_type)?;
        self.convert_to_text(output, format)
    }

    /// Export to `output`. No header is written and a failed export removes `output`.
    pub fn convert_to_text(&self, output: impl AsRef<Path>, format: TextFormat) -> Result<ExportReport> {
        let output = output.as_ref();
        match self.write_text(output, format) {
            Ok(report) => {
                info!(
                    "Converted {} to text: {} ({} rows, {} bytes)",
                    self.path.display(),
                    output.display(),
                    report.rows,
                    report.bytes_written
                );
                Ok(report)
            }
            Err(e) => {
                let _ = fs::remove_file(output);
                Err(e)
            }
        }
    }

    fn write_text(&self, output: &Path, format: TextFormat) -> Result<ExportReport> {
        let sep = format.default_separator();
        let file = File::open(&self.path)
            .map_err(|e| Error::Export(format!("failed to open {}: {}", self.path.display(), e)))?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .and_then(|b| b.with_batch_size(self.batch_size).build())
            .map_err(|e| Error::Export(format!("failed to create batch reader: {}", e)))?;

        let mut out = BufWriter::new(
            File::create(output)
                .map_err(|e| Error::Export(format!("failed to create {}: {}", output.display(), e)))?,
        );
        let mut report = ExportReport {
            rows: 0,
            batches: 0,
            bytes_written: 0,
        };

        for batch in reader {
            let batch = batch.map_err(|e| Error::Export(format!("failed to decode batch: {}", e)))?;
            if batch.num_rows() == 0 {
                continue;
            }
            let text = record_batch_to_text(&batch, sep)?;

            if report.batches > 0 {
                out.write_all(b"\n")
                    .map_err(|e| Error::Export(e.to_string()))?;
                report.bytes_written += 1;
            }
            out.write_all(text.as_bytes())
                .map_err(|e| Error::Export(e.to_string()))?;

            report.bytes_written += text.len() as u64;
            report.rows += batch.num_rows() as u64;
            report.batches += 1;
            debug!("Exported batch {} ({} rows)", report.batches, batch.num_rows());
        }

        out.flush().map_err(|e| Error::Export(e.to_string()))?;
        Ok(report)
    }
}
