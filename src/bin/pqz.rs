use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use log::{info, LevelFilter};

use parquet_zstd_archiver::constants::{
    default_worker_count, DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_SIZE, DEFAULT_COMPRESSION_LEVEL,
    DEFAULT_SAMPLE_LINES,
};
use parquet_zstd_archiver::{BatchReport, Pipeline, PipelineConfig, PipelineStats};

#[derive(Parser)]
#[command(name = "pqz")]
#[command(about = "Archive delimited text files as zstd-compressed Parquet and restore them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    options: Options,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress every .tbl/.csv/.txt file of the input directory
    Compress,
    /// Restore every .zstd archive of the compress directory
    Decompress,
    /// Compress, then restore
    Run,
}

#[derive(Args)]
struct Options {
    /// Directory holding the source text files
    #[arg(long, global = true, default_value = "data")]
    input_dir: PathBuf,

    /// Where archives are written
    #[arg(long, global = true, default_value = "compress")]
    compress_dir: PathBuf,

    /// Where restored text files are written
    #[arg(long, global = true, default_value = "decompress")]
    decompress_dir: PathBuf,

    /// Directory for intermediate Parquet files (defaults to the compress directory)
    #[arg(long, global = true)]
    work_dir: Option<PathBuf>,

    /// Rows per batch and per row group
    #[arg(long, global = true, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Lines sampled after the first one for separator detection
    #[arg(long, global = true, default_value_t = DEFAULT_SAMPLE_LINES)]
    sample_lines: usize,

    /// Bytes per compression chunk
    #[arg(long, global = true, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// zstd compression level
    #[arg(long, global = true, default_value_t = DEFAULT_COMPRESSION_LEVEL, allow_negative_numbers = true)]
    level: i32,

    /// zstd worker threads (default: number of CPU cores)
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Files processed in parallel
    #[arg(short, long, global = true, default_value_t = 1)]
    jobs: usize,

    /// Also append log output to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

/// Writes every log line to both the console and the log file
struct TeeWriter<A, B> {
    console: A,
    file: B,
}

impl<A: Write, B: Write> TeeWriter<A, B> {
    fn new(console: A, file: B) -> Self {
        Self { console, file }
    }
}

impl<A: Write, B: Write> Write for TeeWriter<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.console.write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.console.flush()?;
        self.file.flush()
    }
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Info);
    builder.parse_default_env();

    if let Some(path) = log_file {
        let file = OpenOptions::new().append(true).create(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(TeeWriter::new(io::stderr(), file))));
    }

    builder.try_init()?;
    Ok(())
}

fn report_failures(direction: &str, report: &BatchReport) {
    for failure in &report.failures {
        println!(
            "{} failed for {} after stage {}: {}",
            direction,
            failure.path.display(),
            failure.stage,
            failure.error
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let opts = cli.options;
    init_logging(opts.log_file.as_ref())?;

    let mut builder = PipelineConfig::builder()
        .input_dir(opts.input_dir)
        .compress_dir(opts.compress_dir)
        .decompress_dir(opts.decompress_dir)
        .batch_size(opts.batch_size)
        .sample_lines(opts.sample_lines)
        .chunk_size(opts.chunk_size)
        .compression_level(opts.level)
        .compression_workers(opts.threads.unwrap_or_else(default_worker_count))
        .parallel_files(opts.jobs);
    if let Some(work_dir) = opts.work_dir {
        builder = builder.work_dir(work_dir);
    }

    let config = match builder.build() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    let start_time = Instant::now();
    let pipeline = Pipeline::new(config);
    let mut stats = PipelineStats::new();

    match cli.command {
        Commands::Compress => {
            let report = pipeline.compress_all(&mut stats)?;
            report_failures("Compression", &report);
        }
        Commands::Decompress => {
            let report = pipeline.decompress_all(&mut stats)?;
            report_failures("Decompression", &report);
        }
        Commands::Run => {
            let (forward, reverse) = pipeline.run(&mut stats)?;
            report_failures("Compression", &forward);
            report_failures("Decompression", &reverse);
        }
    }

    info!("Finished in {:.2?}", start_time.elapsed());
    print!("{}", stats);
    Ok(())
}
