// Implementations
pub mod config;
pub mod constants;
pub mod error;
pub mod format;
pub mod io_stats;
pub mod parquet_to_text;
pub mod pipeline;
pub mod schema_inference;
pub mod stats;
pub mod text_reader;
pub mod text_to_parquet;
pub mod zstd_stream;

// Export the main types
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error::{Error, Result, SchemaInferenceError};
pub use format::TextFormat;
pub use io_stats::{IoStatsTracker, TrackedReader, TrackedWriter};
pub use parquet_to_text::{read_container_metadata, ContainerMetadata, ExportReport, ParquetToTextConverter};
pub use pipeline::{BatchReport, FileFailure, ForwardOutcome, Pipeline, ReverseOutcome, Stage};
pub use schema_inference::{infer_schema, InferredSchema};
pub use stats::PipelineStats;
pub use text_reader::{RowBatch, RowBatchReader};
pub use text_to_parquet::{convert_batches, ColumnarWriter, ConversionReport};
pub use zstd_stream::{compress_file, decompress_file, CodecOptions, CompressionReport, DecompressionReport};
