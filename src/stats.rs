//! Aggregate size and timing statistics across a pipeline run

use std::fmt;
use std::time::Duration;

const MB: f64 = 1024.0 * 1024.0;

/// Totals over all successfully processed files. Failed files add nothing
/// except to `failed_files`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    /// Bytes of the source text files
    pub total_original_bytes: u64,
    /// Bytes of the intermediate Parquet containers
    pub total_container_bytes: u64,
    /// Bytes of the final archives
    pub total_compressed_bytes: u64,
    pub file_count: usize,
    pub restored_count: usize,
    pub failed_files: usize,
    pub total_compress_time: Duration,
    pub total_decompress_time: Duration,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one file that made it all the way to an archive
    pub fn record_compression(
        &mut self,
        original_bytes: u64,
        container_bytes: u64,
        compressed_bytes: u64,
        elapsed: Duration,
    ) {
        self.total_original_bytes += original_bytes;
        self.total_container_bytes += container_bytes;
        self.total_compressed_bytes += compressed_bytes;
        self.file_count += 1;
        self.total_compress_time += elapsed;
    }

    /// Account for one archive restored to text
    pub fn record_decompression(&mut self, elapsed: Duration) {
        self.restored_count += 1;
        self.total_decompress_time += elapsed;
    }

    pub fn record_failure(&mut self) {
        self.failed_files += 1;
    }

    /// Fold another set of totals into this one
    pub fn merge(&mut self, other: &PipelineStats) {
        self.total_original_bytes += other.total_original_bytes;
        self.total_container_bytes += other.total_container_bytes;
        self.total_compressed_bytes += other.total_compressed_bytes;
        self.file_count += other.file_count;
        self.restored_count += other.restored_count;
        self.failed_files += other.failed_files;
        self.total_compress_time += other.total_compress_time;
        self.total_decompress_time += other.total_decompress_time;
    }

    /// Percentage of bytes saved relative to the source text, `None` with nothing compressed
    pub fn compression_ratio(&self) -> Option<f64> {
        if self.file_count == 0 || self.total_original_bytes == 0 {
            return None;
        }
        Some((1.0 - self.total_compressed_bytes as f64 / self.total_original_bytes as f64) * 100.0)
    }
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "====== Compression summary ======")?;
        let Some(ratio) = self.compression_ratio() else {
            writeln!(f, "No files were compressed")?;
            return writeln!(f, "Failed files:          {}", self.failed_files);
        };
        writeln!(f, "Files processed:       {}", self.file_count)?;
        writeln!(f, "Files restored:        {}", self.restored_count)?;
        writeln!(f, "Failed files:          {}", self.failed_files)?;
        writeln!(f, "Total original size:   {:.2} MB", self.total_original_bytes as f64 / MB)?;
        writeln!(f, "Total columnar size:   {:.2} MB", self.total_container_bytes as f64 / MB)?;
        writeln!(f, "Total compressed size: {:.2} MB", self.total_compressed_bytes as f64 / MB)?;
        writeln!(f, "Compression ratio:     {:.2}%", ratio)?;
        writeln!(f, "Total compress time:   {:.2}s", self.total_compress_time.as_secs_f64())?;
        writeln!(f, "Total decompress time: {:.2}s", self.total_decompress_time.as_secs_f64())
    }
}
