use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::{error, Level};

use gtfs_subset_core::{
    Bbox, CancellationToken, DateParser, ExtractByBbox, ExtractByDate, Metadata, ProgressHandler,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    #[value(name = "DEBUG")]
    Debug,
    #[value(name = "INFO")]
    Info,
    #[value(name = "WARNING")]
    Warning,
    #[value(name = "ERROR")]
    Error,
    #[value(name = "CRITICAL")]
    Critical,
}

impl LogLevel {
    fn to_tracing(self) -> Level {
        match self {
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warning => Level::WARN,
            // tracing has no level below ERROR; CRITICAL collapses to it.
            LogLevel::Error | LogLevel::Critical => Level::ERROR,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "gtfs-subset", version, about = "GTFS bounding-box and service-date subsetter")]
struct Args {
    #[arg(long = "logging", value_enum, default_value_t = LogLevel::Info, global = true)]
    logging: LogLevel,

    /// Worker count for the chunk pool. Defaults to CPU count minus one, floor 1.
    #[arg(long = "cores", global = true)]
    cores: Option<usize>,

    /// Disable progress bars. Purely cosmetic: output is identical either way.
    #[arg(long = "no-progress", global = true)]
    no_progress: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Restrict the feed to a geographic bounding box.
    ExtractBbox {
        #[arg(long = "input-object")]
        input_object: PathBuf,
        #[arg(long = "output-folder")]
        output_folder: PathBuf,
        #[arg(long = "bbox")]
        bbox: String,
    },
    /// Restrict the feed to a service-date window.
    ExtractDate {
        #[arg(long = "input-object")]
        input_object: PathBuf,
        #[arg(long = "output-folder")]
        output_folder: PathBuf,
        #[arg(long = "start-date")]
        start_date: String,
        #[arg(long = "end-date")]
        end_date: String,
    },
    /// Print the feed's service date window.
    Metadata {
        #[arg(long = "input-object")]
        input_object: PathBuf,
    },
}

fn default_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1)
}

struct IndicatifProgressHandler {
    _multi: MultiProgress,
    pass_pb: ProgressBar,
}

impl IndicatifProgressHandler {
    fn new() -> Self {
        let multi = MultiProgress::new();
        let pass_pb = multi.add(ProgressBar::new(0));
        pass_pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {percent}% {msg}",
            )
            .unwrap()
            .progress_chars("#>-"),
        );
        pass_pb.set_message("Waiting to start...");
        Self {
            _multi: multi,
            pass_pb,
        }
    }
}

impl ProgressHandler for IndicatifProgressHandler {
    fn on_start_pass(&self, file: &str) {
        self.pass_pb.set_message(format!("Filtering {file}"));
    }

    fn on_finish_pass(&self, _file: &str) {
        self.pass_pb.inc(1);
    }

    fn set_total_passes(&self, count: usize) {
        self.pass_pb.set_length(count as u64);
        self.pass_pb.set_message("Starting...");
    }
}

fn build_progress(no_progress: bool) -> Option<Box<dyn ProgressHandler>> {
    if no_progress {
        None
    } else {
        Some(Box::new(IndicatifProgressHandler::new()))
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(args.logging.to_tracing())
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let cores = args.cores.unwrap_or_else(default_cores);
    let cancel = CancellationToken::new();

    match &args.command {
        Command::ExtractBbox {
            input_object,
            output_folder,
            bbox,
        } => {
            let bbox = Bbox::parse(bbox)?;
            let progress = build_progress(args.no_progress);
            let files = ExtractByBbox::run(
                input_object,
                output_folder,
                &bbox,
                cores,
                cancel,
                progress.as_deref(),
            )?;
            tracing::info!("wrote {} file(s) to {}", files.len(), output_folder.display());
            Ok(())
        }
        Command::ExtractDate {
            input_object,
            output_folder,
            start_date,
            end_date,
        } => {
            let start = DateParser::parse(start_date)?;
            let end = DateParser::parse(end_date)?;
            let progress = build_progress(args.no_progress);
            let files = ExtractByDate::run(
                input_object,
                output_folder,
                start,
                end,
                cores,
                cancel,
                progress.as_deref(),
            )?;
            tracing::info!("wrote {} file(s) to {}", files.len(), output_folder.display());
            Ok(())
        }
        Command::Metadata { input_object } => {
            let (start, end) = Metadata::service_date_window(input_object, cores)
                .with_context(|| format!("reading metadata from {}", input_object.display()))?;
            println!(
                "Service date window from '{}' to '{}'",
                DateParser::format(&start),
                DateParser::format(&end)
            );
            Ok(())
        }
    }
}
