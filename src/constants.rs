//! Unified constants for batch, chunk and naming defaults used throughout the codebase

/// Rows per row batch / row group (50K rows)
pub const DEFAULT_BATCH_SIZE: usize = 50_000;

/// Lines read after the first one when inferring the separator
pub const DEFAULT_SAMPLE_LINES: usize = 20;

/// Chunk size for the streaming codec (4MB)
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Zstd level used for archives
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 18;

/// Suffix appended to `<basename>.<ext>` for compressed archives
pub const ARCHIVE_SUFFIX: &str = "zstd";

/// Extension of intermediate columnar containers
pub const CONTAINER_SUFFIX: &str = "parquet";

/// Container metadata key holding the source file extension
pub const ORIGINAL_EXTENSION_KEY: &str = "original_extension";

/// Field metadata key holding the per-column compression hint
pub const COLUMN_COMPRESSION_KEY: &str = "compression";

/// Codec hint attached to string columns
pub const DEFAULT_COLUMN_CODEC: &str = "ZSTD";

/// Extension used when a container carries no `original_extension`
pub const FALLBACK_EXTENSION: &str = "tbl";

/// Lines starting with this marker are ignored during inference
pub const COMMENT_MARKER: char = '#';

/// Separators scored during inference, in tie-break priority order
pub const CANDIDATE_SEPARATORS: [char; 3] = ['|', ',', '\t'];

/// Prefix of the synthetic column names (`col_0`, `col_1`, ...)
pub const COLUMN_NAME_PREFIX: &str = "col_";

/// Number of compression workers to use by default (one per logical CPU)
#[inline]
pub fn default_worker_count() -> usize {
    num_cpus::get().max(1)
}

/// Build the synthetic name of the column at `index`
#[inline]
pub fn column_name(index: usize) -> String {
    format!("{}{}", COLUMN_NAME_PREFIX, index)
}

/// Generate `col_0 .. col_{count-1}`
pub fn column_names(count: usize) -> Vec<String> {
    (0..count).map(column_name).collect()
}
