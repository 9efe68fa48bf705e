use clap::{Parser, Subcommand};
use imgprobe::output::{self, ProbeEntry};
use imgprobe::{ProbeError, ProbeOptions, ProbeReport, config, probe_prefix, probe_reader};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::Level;

/// Shared flags for commands that probe a stream.
#[derive(clap::Args, Clone)]
struct ProbeArgs {
    /// Bytes handed to the engine per read
    #[arg(long, default_value_t = 4096)]
    chunk_size: usize,

    /// Probe settings file (budgets and policies)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read the EXIF orientation of JPEG files
    #[arg(long)]
    exif: bool,
}

fn version_string() -> &'static str {
    if env!("IMGPROBE_ON_RELEASE_TAG") == "true" {
        return env!("CARGO_PKG_VERSION");
    }
    let hash = env!("IMGPROBE_GIT_HASH");
    if hash.is_empty() {
        "dev@unknown"
    } else {
        // Leaked once at startup
        Box::leak(format!("dev@{hash}").into_boxed_str())
    }
}

#[derive(Parser)]
#[command(name = "imgprobe")]
#[command(about = "Detect image type and dimensions from the first bytes of a stream")]
#[command(long_about = "\
Detect image type and dimensions from the first bytes of a stream

Files are read in chunks and only as much of each file is buffered as the
format needs: a fixed header for BMP, DDS, GIF, PSD, PNG and WebP, the first
500 bytes for SVG, and a marker scan up to the frame header for JPEG.

Supported: image/bmp, image/dds, image/gif, image/psd, image/png,
           image/webp, image/svg+xml, image/jpeg

Budgets and policies can be set in a probe.toml file; run
'imgprobe gen-config' to print one with every option documented.")]
#[command(version = version_string())]
struct Cli {
    /// More log output on stderr (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Probe one or more files
    Probe {
        /// Files to probe
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        args: ProbeArgs,

        /// Print a JSON array instead of one line per file
        #[arg(long)]
        json: bool,
    },
    /// Copy stdin to stdout unchanged and report on stderr
    Pipe(ProbeArgs),
    /// Print a stock probe.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Probe { files, args, json } => {
            let probe_config = load_probe_config(&args)?;
            let entries: Vec<ProbeEntry> = files
                .iter()
                .map(|path| {
                    let result = probe_file(path, &probe_config, &args);
                    ProbeEntry::new(path.display().to_string(), &result)
                })
                .collect();
            if json {
                output::print_entries_json(&entries)?;
            } else {
                output::print_entries(&entries);
            }
            if entries.iter().any(|e| e.error.is_some()) {
                std::process::exit(1);
            }
        }
        Command::Pipe(args) => {
            let probe_config = load_probe_config(&args)?;
            let result = probe_reader(
                io::stdin().lock(),
                io::stdout().lock(),
                args.chunk_size,
                probe_options(&probe_config, &args),
            )
            .map(|(_, report)| report);
            let entry = ProbeEntry::new("-", &result);
            eprintln!("{}", output::format_entry(&entry));
            if entry.error.is_some() {
                std::process::exit(1);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr so `pipe` output stays byte-exact.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn load_probe_config(args: &ProbeArgs) -> Result<config::ProbeConfig, config::ConfigError> {
    match &args.config {
        Some(path) => config::load_config(path),
        None => Ok(config::ProbeConfig::default()),
    }
}

fn probe_options(probe_config: &config::ProbeConfig, args: &ProbeArgs) -> ProbeOptions {
    let options = ProbeOptions::from_config(probe_config);
    if args.exif {
        options.exif(|_, _| true)
    } else {
        options
    }
}

fn probe_file(
    path: &Path,
    probe_config: &config::ProbeConfig,
    args: &ProbeArgs,
) -> Result<ProbeReport, ProbeError> {
    let file = File::open(path)?;
    probe_prefix(file, args.chunk_size, probe_options(probe_config, args))
}
