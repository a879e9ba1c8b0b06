//! Streaming zstd envelope around the columnar container
//!
//! Compression runs the multi-worker zstd encoder over fixed-size chunks of
//! the input; decompression is a single sequential pass. Both hold one chunk
//! in memory regardless of stream length. An archive is exactly one zstd
//! frame with a content checksum and no extra header.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use log::{debug, info};
use zstd::stream::{Decoder, Encoder};

use crate::constants::{default_worker_count, DEFAULT_CHUNK_SIZE, DEFAULT_COMPRESSION_LEVEL};
use crate::error::{Error, Result};
use crate::io_stats::{IoStatsTracker, TrackedReader, TrackedWriter};

/// Encoder settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecOptions {
    pub level: i32,
    /// Encoder worker threads; 0 or 1 compresses on the calling thread
    pub workers: usize,
    pub chunk_size: usize,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            level: DEFAULT_COMPRESSION_LEVEL,
            workers: default_worker_count(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Byte counts and wall-clock time of one pass over a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamReport {
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionReport {
    pub original_size: u64,
    pub compressed_size: u64,
    pub elapsed: Duration,
}

impl CompressionReport {
    /// Percentage of bytes saved, `0.0` for empty input
    pub fn ratio(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        (1.0 - self.compressed_size as f64 / self.original_size as f64) * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecompressionReport {
    pub compressed_size: u64,
    pub output_size: u64,
    pub elapsed: Duration,
}

/// Compress everything from `reader` into one zstd frame written to `writer`
pub fn compress_stream<R: Read, W: Write>(
    reader: R,
    writer: W,
    options: &CodecOptions,
) -> Result<StreamReport> {
    let start = Instant::now();
    let tracker = IoStatsTracker::new();
    let mut reader = TrackedReader::new(reader, tracker.clone());
    let sink = TrackedWriter::new(writer, tracker.clone());

    let mut encoder = Encoder::new(sink, options.level)?;
    if options.workers > 1 {
        encoder.multithread(options.workers as u32)?;
    }
    encoder.include_checksum(true)?;

    let mut buf = vec![0u8; options.chunk_size.max(1)];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        encoder.write_all(&buf[..n])?;
    }

    let mut sink = encoder.finish()?;
    sink.flush()?;

    Ok(StreamReport {
        bytes_in: tracker.read_bytes(),
        bytes_out: tracker.write_bytes(),
        elapsed: start.elapsed(),
    })
}

/// Decode one zstd archive from `reader` into `writer`.
/// Truncated or corrupt input fails with [`Error::Decompression`].
pub fn decompress_stream<R: Read, W: Write>(
    reader: R,
    writer: W,
    chunk_size: usize,
) -> Result<StreamReport> {
    let start = Instant::now();
    let tracker = IoStatsTracker::new();
    let source = TrackedReader::new(reader, tracker.clone());
    let mut sink = TrackedWriter::new(writer, tracker.clone());

    let mut decoder = Decoder::new(source).map_err(|e| Error::Decompression(e.to_string()))?;

    let mut buf = vec![0u8; chunk_size.max(1)];
    loop {
        let n = decoder
            .read(&mut buf)
            .map_err(|e| Error::Decompression(e.to_string()))?;
        if n == 0 {
            break;
        }
        sink.write_all(&buf[..n])?;
    }
    sink.flush()?;

    Ok(StreamReport {
        bytes_in: tracker.read_bytes(),
        bytes_out: tracker.write_bytes(),
        elapsed: start.elapsed(),
    })
}

/// Compress the file at `input` into the archive `output`.
/// A failed run removes whatever part of `output` was written.
pub fn compress_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &CodecOptions,
) -> Result<CompressionReport> {
    let input = input.as_ref();
    let output = output.as_ref();

    let src = File::open(input)?;
    let dst = File::create(output)?;

    let result = compress_stream(BufReader::new(src), BufWriter::new(dst), options);
    let stream = match result {
        Ok(stream) => stream,
        Err(e) => {
            let _ = fs::remove_file(output);
            return Err(e);
        }
    };

    let report = CompressionReport {
        original_size: stream.bytes_in,
        compressed_size: stream.bytes_out,
        elapsed: stream.elapsed,
    };
    info!(
        "Compressed {} -> {}: {} -> {} bytes ({:.2}% saved) in {:.2?}",
        input.display(),
        output.display(),
        report.original_size,
        report.compressed_size,
        report.ratio(),
        report.elapsed
    );
    Ok(report)
}

/// Decompress the archive at `input` into `output`.
/// On any failure `output` is removed so no partial file is left behind.
pub fn decompress_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    chunk_size: usize,
) -> Result<DecompressionReport> {
    let input = input.as_ref();
    let output = output.as_ref();

    let src = File::open(input)?;
    let dst = File::create(output)?;

    let stream = match decompress_stream(BufReader::new(src), BufWriter::new(dst), chunk_size) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = fs::remove_file(output);
            return Err(e);
        }
    };

    debug!(
        "Decompressed {} -> {}: {} -> {} bytes in {:.2?}",
        input.display(),
        output.display(),
        stream.bytes_in,
        stream.bytes_out,
        stream.elapsed
    );
    Ok(DecompressionReport {
        compressed_size: stream.bytes_in,
        output_size: stream.bytes_out,
        elapsed: stream.elapsed,
    })
}
