use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use ibz_core::{Mode, ParallelCompressor, PipelineConfig, ProgressObserver, RunReport};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "IBZ_LOG";

#[derive(Parser)]
#[command(
    name = "ibz",
    version,
    about = "Multi-threaded block compressor",
    long_about = "Compress files into offset-addressed .ibz containers and restore them."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file into an .ibz container.
    Compress(RunArgs),
    /// Restore a file from an .ibz container.
    Decompress(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Source file.
    input: PathBuf,

    /// Destination file; created or truncated.
    output: PathBuf,

    /// Number of transform worker threads (defaults to CPU count).
    #[arg(long, default_value_t = num_cpus::get())]
    workers: usize,

    /// Items each stage admits before the reader blocks.
    #[arg(long, default_value_t = 4)]
    queue_capacity: usize,

    /// Plain block size used when compressing (supports suffixes K/M/G).
    #[arg(long, default_value = "8K", value_parser = parse_size)]
    block_size: usize,

    /// Gzip level from 0 (store) to 9 (best).
    #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u32).range(0..=9))]
    level: u32,

    /// Suppress the progress line.
    #[arg(short, long, default_value_t = false)]
    quiet: bool,
}

impl RunArgs {
    fn config(&self) -> PipelineConfig {
        PipelineConfig::default()
            .with_workers(self.workers)
            .with_queue_capacity(self.queue_capacity)
            .with_block_size(self.block_size)
            .with_compression_level(self.level)
    }
}

fn main() {
    init_logging();

    let cli = Cli::parse();
    let (mode, args) = match cli.command {
        Commands::Compress(args) => (Mode::Compress, args),
        Commands::Decompress(args) => (Mode::Decompress, args),
    };

    let report = run_command(mode, &args);
    print_report(&report);
    std::process::exit(report.exit_code());
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run_command(mode: Mode, args: &RunArgs) -> RunReport {
    let config = args.config();
    tracing::debug!(
        mode = mode.as_str(),
        workers = config.workers,
        queue_capacity = config.queue_capacity,
        block_size = config.block_size,
        "starting run"
    );

    let compressor = if args.quiet {
        ParallelCompressor::new(config)
    } else {
        let observer: Arc<dyn ProgressObserver> = Arc::new(print_progress);
        ParallelCompressor::with_observer(config, observer)
    };

    compressor.run(mode, &args.input, &args.output)
}

fn print_progress(percent: u8) {
    let mut stderr = io::stderr().lock();
    let _ = write!(stderr, "\rProgress: {percent}%");
    let _ = stderr.flush();
}

fn print_report(report: &RunReport) {
    eprintln!();
    if report.is_success() {
        println!("Success");
        println!("{}", report.summary());
    } else {
        eprintln!("{}", report.summary());
        if let Some(message) = &report.error_message {
            tracing::info!(error = %message, "run failed");
        }
    }
}

fn parse_size(value: &str) -> Result<usize, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("size cannot be empty".to_string());
    }

    let split_at = trimmed
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (num_part, suffix_part) = trimmed.split_at(split_at);
    if num_part.is_empty() {
        return Err(format!("invalid size: {value}"));
    }

    let base: usize = num_part
        .parse()
        .map_err(|_| format!("invalid size number: {value}"))?;

    let multiplier = match suffix_part.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1usize,
        "k" | "kb" => 1024,
        "m" | "mb" => 1024 * 1024,
        "g" | "gb" => 1024 * 1024 * 1024,
        other => return Err(format!("invalid size suffix '{other}' in '{value}'")),
    };

    match base.checked_mul(multiplier) {
        Some(0) => Err("size must be at least one byte".to_string()),
        Some(size) => Ok(size),
        None => Err(format!("size overflow: {value}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_size_suffixes() {
        assert_eq!(parse_size("8K"), Ok(8192));
        assert_eq!(parse_size("2mb"), Ok(2 * 1024 * 1024));
        assert_eq!(parse_size("512"), Ok(512));
        assert!(parse_size("0").is_err());
        assert!(parse_size("12X").is_err());
        assert!(parse_size("").is_err());
    }

    #[test]
    fn cli_accepts_positional_paths() {
        let cli = Cli::try_parse_from(["ibz", "compress", "in.bin", "out.ibz", "--workers", "3"]);
        let Ok(Cli {
            command: Commands::Compress(args),
        }) = cli
        else {
            panic!("compress arguments did not parse");
        };
        assert_eq!(args.input, PathBuf::from("in.bin"));
        assert_eq!(args.config().workers, 3);
        assert_eq!(args.config().block_size, 8192);
    }

    #[test]
    fn cli_rejects_level_out_of_range() {
        assert!(Cli::try_parse_from(["ibz", "decompress", "a", "b", "--level", "12"]).is_err());
    }
}
