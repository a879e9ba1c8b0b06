//! Row batch to Parquet conversion
//!
//! Every batch becomes one row group that is flushed before the next batch is
//! pulled, so memory stays bounded by a single batch. All columns are nullable
//! Utf8 named `col_0 .. col_{n-1}`, dictionary encoded, and annotated with a
//! zstd compression hint. Pages themselves are left uncompressed because the
//! whole container is compressed afterwards.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use log::{debug, info, warn};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::{EnabledStatistics, WriterProperties};

use crate::constants::{
    column_name, COLUMN_COMPRESSION_KEY, DEFAULT_BATCH_SIZE, DEFAULT_COLUMN_CODEC,
    ORIGINAL_EXTENSION_KEY,
};
use crate::error::{Error, Result};
use crate::format::TextFormat;
use crate::text_reader::RowBatch;

/// Summary of a finished container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionReport {
    pub rows: u64,
    pub row_groups: usize,
}

/// Arrow schema for a container with `column_count` string columns
pub fn container_schema(column_count: usize, format: TextFormat) -> SchemaRef {
    let fields: Vec<Field> = (0..column_count)
        .map(|i| {
            let hint = HashMap::from([(
                COLUMN_COMPRESSION_KEY.to_string(),
                DEFAULT_COLUMN_CODEC.to_string(),
            )]);
            Field::new(column_name(i), DataType::Utf8, true).with_metadata(hint)
        })
        .collect();

    let metadata = HashMap::from([(
        ORIGINAL_EXTENSION_KEY.to_string(),
        format.extension().to_string(),
    )]);
    Arc::new(Schema::new_with_metadata(fields, metadata))
}

fn writer_properties(format: TextFormat, max_row_group_size: usize) -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::UNCOMPRESSED)
        .set_dictionary_enabled(true)
        .set_statistics_enabled(EnabledStatistics::None)
        .set_max_row_group_size(max_row_group_size.max(1))
        .set_key_value_metadata(Some(vec![KeyValue::new(
            ORIGINAL_EXTENSION_KEY.to_string(),
            format.extension().to_string(),
        )]))
        .build()
}

/// Append-only Parquet writer fed with [`RowBatch`]es of a fixed width
pub struct ColumnarWriter {
    writer: ArrowWriter<File>,
    schema: SchemaRef,
    path: PathBuf,
    batches_written: usize,
}

impl ColumnarWriter {
    /// Create the container at `path`. Metadata is fixed from here on.
    pub fn create(
        path: impl AsRef<Path>,
        column_count: usize,
        format: TextFormat,
        max_row_group_size: usize,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let schema = container_schema(column_count, format);
        let file = File::create(&path)?;
        let writer = ArrowWriter::try_new(
            file,
            schema.clone(),
            Some(writer_properties(format, max_row_group_size)),
        )
        .map_err(|e| Error::Conversion(format!("failed to create Parquet writer: {}", e)))?;

        Ok(Self {
            writer,
            schema,
            path,
            batches_written: 0,
        })
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn column_count(&self) -> usize {
        self.schema.fields().len()
    }

    /// Write `batch` as its own row group
    pub fn write_batch(&mut self, batch: &RowBatch) -> Result<()> {
        if batch.column_count() != self.column_count() {
            return Err(Error::SchemaMismatch {
                batch: self.batches_written,
                expected: self.column_count(),
                found: batch.column_count(),
            });
        }
        if batch.is_empty() {
            return Ok(());
        }

        let record_batch = batch
            .to_record_batch(&self.schema)
            .map_err(|e| Error::Conversion(format!("failed to build record batch: {}", e)))?;
        self.writer
            .write(&record_batch)
            .map_err(|e| Error::Conversion(format!("failed to write row group: {}", e)))?;
        self.writer
            .flush()
            .map_err(|e| Error::Conversion(format!("failed to flush row group: {}", e)))?;

        debug!(
            "Wrote row group {} ({} rows) to {}",
            self.batches_written,
            batch.num_rows(),
            self.path.display()
        );
        self.batches_written += 1;
        Ok(())
    }

    /// Write the footer and finish the file
    pub fn close(self) -> Result<ConversionReport> {
        let metadata = self
            .writer
            .close()
            .map_err(|e| Error::Conversion(format!("failed to close Parquet writer: {}", e)))?;
        Ok(ConversionReport {
            rows: metadata.num_rows.max(0) as u64,
            row_groups: metadata.row_groups.len(),
        })
    }
}

/// Drive a lazy sequence of batches into a new container at `output`.
///
/// The first batch fixes the column count; a later batch of another width
/// aborts with [`Error::SchemaMismatch`]. On failure the footer is still
/// written when possible so row groups flushed so far stay readable.
pub fn convert_batches<I>(batches: I, output: impl AsRef<Path>, format: TextFormat) -> Result<ConversionReport>
where
    I: IntoIterator<Item = Result<RowBatch>>,
{
    convert_batches_with_row_group_size(batches, output, format, DEFAULT_BATCH_SIZE)
}

pub fn convert_batches_with_row_group_size<I>(
    batches: I,
    output: impl AsRef<Path>,
    format: TextFormat,
    max_row_group_size: usize,
) -> Result<ConversionReport>
where
    I: IntoIterator<Item = Result<RowBatch>>,
{
    let output = output.as_ref();
    let mut batches = batches.into_iter();

    let first = match batches.next() {
        Some(batch) => batch?,
        None => return Err(Error::Conversion("no rows to convert".to_string())),
    };

    let mut writer = ColumnarWriter::create(output, first.column_count(), format, max_row_group_size)?;
    info!(
        "Parquet schema initialised for {}: {} columns, original extension {}",
        output.display(),
        writer.column_count(),
        format
    );

    let result = std::iter::once(Ok(first))
        .chain(batches)
        .try_for_each(|batch| writer.write_batch(&batch?));

    if let Err(e) = result {
        if let Err(close_err) = writer.close() {
            warn!(
                "Could not finalise partial container {}: {}",
                output.display(),
                close_err
            );
        }
        return Err(e);
    }

    let report = writer.close()?;
    info!(
        "Columnar file written: {} ({} rows in {} row groups)",
        output.display(),
        report.rows,
        report.row_groups
    );
    Ok(report)
}
