//! Pipeline configuration and its builder

use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{
    default_worker_count, DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_SIZE, DEFAULT_COMPRESSION_LEVEL,
    DEFAULT_SAMPLE_LINES,
};
use crate::error::{Error, Result};
use crate::zstd_stream::CodecOptions;

/// Directories and tuning knobs for one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub compress_dir: PathBuf,
    pub decompress_dir: PathBuf,
    /// Where intermediate containers live; defaults to `compress_dir`
    pub work_dir: Option<PathBuf>,
    pub batch_size: usize,
    pub sample_lines: usize,
    pub chunk_size: usize,
    pub compression_level: i32,
    pub compression_workers: usize,
    /// Files processed at once
    pub parallel_files: usize,
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }

    pub fn work_dir(&self) -> &Path {
        self.work_dir.as_deref().unwrap_or(&self.compress_dir)
    }

    pub fn codec_options(&self) -> CodecOptions {
        CodecOptions {
            level: self.compression_level,
            workers: self.compression_workers,
            chunk_size: self.chunk_size,
        }
    }

    /// Create the output and work directories if missing
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.compress_dir)?;
        fs::create_dir_all(&self.decompress_dir)?;
        fs::create_dir_all(self.work_dir())?;
        Ok(())
    }
}

/// Builder for [`PipelineConfig`]
pub struct PipelineConfigBuilder {
    input_dir: PathBuf,
    compress_dir: PathBuf,
    decompress_dir: PathBuf,
    work_dir: Option<PathBuf>,
    batch_size: usize,
    sample_lines: usize,
    chunk_size: usize,
    compression_level: i32,
    compression_workers: usize,
    parallel_files: usize,
}

impl Default for PipelineConfigBuilder {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data"),
            compress_dir: PathBuf::from("compress"),
            decompress_dir: PathBuf::from("decompress"),
            work_dir: None,
            batch_size: DEFAULT_BATCH_SIZE,
            sample_lines: DEFAULT_SAMPLE_LINES,
            chunk_size: DEFAULT_CHUNK_SIZE,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            compression_workers: default_worker_count(),
            parallel_files: 1,
        }
    }
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.input_dir = dir.into();
        self
    }

    pub fn compress_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.compress_dir = dir.into();
        self
    }

    pub fn decompress_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.decompress_dir = dir.into();
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn batch_size(mut self, rows: usize) -> Self {
        self.batch_size = rows;
        self
    }

    pub fn sample_lines(mut self, lines: usize) -> Self {
        self.sample_lines = lines;
        self
    }

    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    pub fn compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    pub fn compression_workers(mut self, workers: usize) -> Self {
        self.compression_workers = workers;
        self
    }

    pub fn parallel_files(mut self, files: usize) -> Self {
        self.parallel_files = files;
        self
    }

    pub fn build(self) -> Result<PipelineConfig> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch size must be at least 1 row".into()));
        }
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk size must be at least 1 byte".into()));
        }
        let levels = zstd::compression_level_range();
        if !levels.contains(&self.compression_level) {
            return Err(Error::Config(format!(
                "compression level {} outside {}..={}",
                self.compression_level,
                levels.start(),
                levels.end()
            )));
        }
        if self.parallel_files == 0 {
            return Err(Error::Config("parallel files must be at least 1".into()));
        }

        Ok(PipelineConfig {
            input_dir: self.input_dir,
            compress_dir: self.compress_dir,
            decompress_dir: self.decompress_dir,
            work_dir: self.work_dir,
            batch_size: self.batch_size,
            sample_lines: self.sample_lines,
            chunk_size: self.chunk_size,
            compression_level: self.compression_level,
            compression_workers: self.compression_workers,
            parallel_files: self.parallel_files,
        })
    }
}
