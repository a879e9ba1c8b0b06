//! File-level orchestration of the forward (text -> archive) and reverse
//! (archive -> text) pipelines.
//!
//! Forward: `Pending -> Inferred -> Columnarized -> Compressed -> Done`.
//! Reverse: `Pending -> Decompressed -> MetadataRead -> Exported -> Done`.
//! A failure at any stage is logged with the file and the last stage reached,
//! then the next file is processed. Intermediate containers are removed only
//! after the step consuming them succeeded; a crash in between leaves them
//! behind.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crossbeam::channel;
use log::{error, info, warn};

use crate::config::PipelineConfig;
use crate::constants::{ARCHIVE_SUFFIX, CONTAINER_SUFFIX, FALLBACK_EXTENSION};
use crate::error::{Error, Result, SchemaInferenceError};
use crate::format::TextFormat;
use crate::parquet_to_text::{read_container_metadata, ParquetToTextConverter};
use crate::schema_inference::{infer_schema, InferredSchema};
use crate::stats::PipelineStats;
use crate::text_reader::RowBatchReader;
use crate::text_to_parquet::convert_batches_with_row_group_size;
use crate::zstd_stream::{compress_file, decompress_file};

/// Progress of a single file through either direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pending,
    Inferred,
    Columnarized,
    Compressed,
    Decompressed,
    MetadataRead,
    Exported,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of compressing one text file
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardOutcome {
    pub source: PathBuf,
    pub archive: PathBuf,
    pub schema: InferredSchema,
    pub rows: u64,
    pub original_bytes: u64,
    pub container_bytes: u64,
    pub compressed_bytes: u64,
    pub elapsed: Duration,
}

/// Result of restoring one archive
#[derive(Debug, Clone, PartialEq)]
pub struct ReverseOutcome {
    pub archive: PathBuf,
    pub output: PathBuf,
    pub original_extension: String,
    pub rows: u64,
    pub elapsed: Duration,
}

/// A file that did not make it through; `stage` is the last stage reached
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub stage: Stage,
    pub error: Error,
}

/// Per-run listing of which files succeeded and which failed
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<PathBuf>,
    pub failures: Vec<FileFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn sort(&mut self) {
        self.succeeded.sort();
        self.failures.sort_by(|a, b| a.path.cmp(&b.path));
    }
}

/// `<base>.<ext>.zstd` -> (`<base>.<ext>`, `<base>`)
pub fn split_archive_name(archive: &Path) -> Option<(String, String)> {
    let name = archive.file_name()?.to_str()?;
    let stem = name.strip_suffix(&format!(".{}", ARCHIVE_SUFFIX))?;
    if stem.is_empty() {
        return None;
    }
    let base = Path::new(stem).file_stem()?.to_str()?.to_string();
    Some((stem.to_string(), base))
}

fn file_len(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn remove_intermediate(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("Could not remove intermediate {}: {}", path.display(), e);
    }
}

/// List regular files in `dir` accepted by `filter`, sorted by path
fn list_files(dir: &Path, filter: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && filter(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Compress one text file into `<compress_dir>/<name>.<ext>.zstd`
    pub fn compress_file(&self, source: &Path) -> Result<ForwardOutcome> {
        self.config.ensure_dirs()?;
        let mut stage = Stage::Pending;
        self.run_forward(source, &mut stage)
    }

    /// Restore one archive into `<decompress_dir>/<base>.<original_extension>`
    pub fn decompress_file(&self, archive: &Path) -> Result<ReverseOutcome> {
        self.config.ensure_dirs()?;
        let mut stage = Stage::Pending;
        self.run_reverse(archive, &mut stage)
    }

    fn run_forward(&self, source: &Path, stage: &mut Stage) -> Result<ForwardOutcome> {
        let start = Instant::now();
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let format = TextFormat::from_extension(ext)
            .map_err(|_| SchemaInferenceError::UnsupportedType(ext.to_string()))?;
        let file_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Conversion(format!("unusable file name: {}", source.display())))?;
        info!("Processing file: {}", source.display());

        let schema = infer_schema(source, format, self.config.sample_lines)?;
        *stage = Stage::Inferred;

        let container = self
            .config
            .work_dir()
            .join(format!("{}.{}", file_name, CONTAINER_SUFFIX));
        let batches = RowBatchReader::from_path(source, &schema, self.config.batch_size)?;
        let conversion =
            convert_batches_with_row_group_size(batches, &container, format, self.config.batch_size)?;
        *stage = Stage::Columnarized;

        let archive = self
            .config
            .compress_dir
            .join(format!("{}.{}", file_name, ARCHIVE_SUFFIX));
        let compression = compress_file(&container, &archive, &self.config.codec_options())?;
        *stage = Stage::Compressed;

        remove_intermediate(&container);
        *stage = Stage::Done;

        let outcome = ForwardOutcome {
            source: source.to_path_buf(),
            archive,
            schema,
            rows: conversion.rows,
            original_bytes: file_len(source),
            container_bytes: compression.original_size,
            compressed_bytes: compression.compressed_size,
            elapsed: start.elapsed(),
        };
        info!(
            "Compressed {} -> {} ({} rows) in {:.2}s",
            source.display(),
            outcome.archive.display(),
            outcome.rows,
            outcome.elapsed.as_secs_f64()
        );
        Ok(outcome)
    }

    fn run_reverse(&self, archive: &Path, stage: &mut Stage) -> Result<ReverseOutcome> {
        let start = Instant::now();
        let (stem, base) = split_archive_name(archive).ok_or_else(|| {
            Error::Decompression(format!("not an archive name: {}", archive.display()))
        })?;

        let container = self
            .config
            .work_dir()
            .join(format!("{}.{}", stem, CONTAINER_SUFFIX));
        decompress_file(archive, &container, self.config.chunk_size)?;
        *stage = Stage::Decompressed;

        let metadata = read_container_metadata(&container)?;
        let original_extension = metadata.extension_or(FALLBACK_EXTENSION).to_string();
        let format = TextFormat::from_extension(&original_extension)?;
        *stage = Stage::MetadataRead;

        let output = self
            .config
            .decompress_dir
            .join(format!("{}.{}", base, original_extension));
        let export = ParquetToTextConverter::new(&container)?
            .with_batch_size(self.config.batch_size)
            .convert_to_text(&output, format)?;
        *stage = Stage::Exported;

        remove_intermediate(&container);
        *stage = Stage::Done;

        info!("Decompressed {} -> {}", archive.display(), output.display());
        Ok(ReverseOutcome {
            archive: archive.to_path_buf(),
            output,
            original_extension,
            rows: export.rows,
            elapsed: start.elapsed(),
        })
    }

    /// Compress every `.tbl`/`.csv`/`.txt` file in the input directory
    pub fn compress_all(&self, stats: &mut PipelineStats) -> Result<BatchReport> {
        info!("====== Starting compression ======");
        self.config.ensure_dirs()?;
        let files = list_files(&self.config.input_dir, |p| TextFormat::from_path(p).is_some())?;
        let report = self.process_files(files, stats, |path, stage| {
            let outcome = self.run_forward(path, stage)?;
            let mut delta = PipelineStats::new();
            delta.record_compression(
                outcome.original_bytes,
                outcome.container_bytes,
                outcome.compressed_bytes,
                outcome.elapsed,
            );
            Ok(delta)
        });
        info!(
            "Compression finished: {} succeeded, {} failed",
            report.succeeded.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Restore every `.zstd` archive in the compress directory
    pub fn decompress_all(&self, stats: &mut PipelineStats) -> Result<BatchReport> {
        info!("====== Starting decompression ======");
        self.config.ensure_dirs()?;
        let files = list_files(&self.config.compress_dir, |p| split_archive_name(p).is_some())?;
        let report = self.process_files(files, stats, |path, stage| {
            let outcome = self.run_reverse(path, stage)?;
            let mut delta = PipelineStats::new();
            delta.record_decompression(outcome.elapsed);
            Ok(delta)
        });
        info!(
            "Decompression finished: {} succeeded, {} failed",
            report.succeeded.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Compress the input directory, then restore every archive
    pub fn run(&self, stats: &mut PipelineStats) -> Result<(BatchReport, BatchReport)> {
        let forward = self.compress_all(stats)?;
        let reverse = self.decompress_all(stats)?;
        Ok((forward, reverse))
    }

    fn process_files<F>(&self, files: Vec<PathBuf>, stats: &mut PipelineStats, job: F) -> BatchReport
    where
        F: Fn(&Path, &mut Stage) -> Result<PipelineStats> + Sync,
    {
        let mut report = BatchReport::default();
        let workers = self.config.parallel_files.min(files.len()).max(1);

        if workers == 1 {
            for path in files {
                let mut stage = Stage::Pending;
                let result = job(&path, &mut stage);
                settle(path, stage, result, stats, &mut report);
            }
            return report;
        }

        let (tx, rx) = channel::unbounded::<PathBuf>();
        for path in files {
            // The receiver is alive, so this cannot fail
            let _ = tx.send(path);
        }
        drop(tx);

        let shared = Mutex::new((PipelineStats::new(), BatchReport::default()));
        let scope_result = crossbeam::scope(|s| {
            for _ in 0..workers {
                let rx = rx.clone();
                let shared = &shared;
                let job = &job;
                s.spawn(move |_| {
                    for path in rx.iter() {
                        let mut stage = Stage::Pending;
                        let result = job(&path, &mut stage);
                        let mut guard = shared.lock().unwrap_or_else(|e| e.into_inner());
                        let (delta, report) = &mut *guard;
                        settle(path, stage, result, delta, report);
                    }
                });
            }
        });
        if scope_result.is_err() {
            error!("A file worker panicked; its remaining files were not processed");
        }

        let (delta, mut shared_report) = shared.into_inner().unwrap_or_else(|e| e.into_inner());
        stats.merge(&delta);
        shared_report.sort();
        report.succeeded = shared_report.succeeded;
        report.failures = shared_report.failures;
        report
    }
}

fn settle(
    path: PathBuf,
    stage: Stage,
    result: Result<PipelineStats>,
    stats: &mut PipelineStats,
    report: &mut BatchReport,
) {
    match result {
        Ok(delta) => {
            stats.merge(&delta);
            report.succeeded.push(path);
        }
        Err(e) => {
            error!(
                "File {} failed after stage {}: {} ({})",
                path.display(),
                stage,
                e,
                e.kind()
            );
            stats.record_failure();
            report.failures.push(FileFailure {
                path,
                stage,
                error: e,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_names() {
        assert_eq!(
            split_archive_name(Path::new("compress/customer.tbl.zstd")).unwrap(),
            ("customer.tbl".to_string(), "customer".to_string())
        );
        assert_eq!(
            split_archive_name(Path::new("a.b.csv.zstd")).unwrap(),
            ("a.b.csv".to_string(), "a.b".to_string())
        );
        assert_eq!(split_archive_name(Path::new("customer.parquet")), None);
        assert_eq!(split_archive_name(Path::new(".zstd")), None);
    }

    #[test]
    fn test_list_files_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.csv", "a.tbl", "notes.md", "c.txt"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        fs::create_dir(dir.path().join("sub.csv")).unwrap();
        let files = list_files(dir.path(), |p| TextFormat::from_path(p).is_some()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.tbl", "b.csv", "c.txt"]);
    }

    #[test]
    fn test_unsupported_source() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::builder()
            .input_dir(dir.path())
            .compress_dir(dir.path().join("c"))
            .decompress_dir(dir.path().join("d"))
            .build()
            .unwrap();
        let pipeline = Pipeline::new(config);
        let path = dir.path().join("x.json");
        fs::write(&path, "{}").unwrap();
        let err = pipeline.compress_file(&path).unwrap_err();
        assert!(matches!(
            err,
            Error::SchemaInference(SchemaInferenceError::UnsupportedType(_))
        ));
    }
}
