use std::io::Write;
use std::path::PathBuf;
use std::process;

use anstyle::{AnsiColor, Style};
use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use tracelat::experiment::{self, Experiment};
use tracelat::{AnalysisConfig, Protocol};

#[derive(Parser)]
#[command(name = "tracelat")]
#[command(about = "Latency statistics from Jaeger traces, per protocol", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Config file (default: $TRACELAT_CONFIG_PATH or ~/.config/tracelat/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log more (-v for progress, -vv for debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report every run of an experiment, plus one aggregate per protocol
    ///
    /// Reads <BASE_DIR>/<protocol>/<EXPERIMENT>/<run>/*.json.
    Run {
        /// Directory holding one subdirectory per protocol
        #[arg(long)]
        base_dir: PathBuf,

        /// Experiment name, e.g. 500u10p
        #[arg(long)]
        experiment: String,

        /// Protocol to process (repeatable; default: all configured).
        /// One of: rest, grpc, thrift, "RabbitMQ sync", "RabbitMQ async",
        /// "Kafka sync", "Kafka async"
        #[arg(long = "protocol")]
        protocols: Vec<Protocol>,

        /// Number of runs, numbered from 1
        #[arg(long)]
        runs: Option<u32>,

        /// Where per-run bucket files are written
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Report a set of batch files as a single scope
    Report {
        /// Protocol whose classification rule applies
        #[arg(long)]
        protocol: Protocol,

        /// Jaeger batch files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Re-aggregate persisted run bucket files without reading traces
    Aggregate {
        /// Protocol the runs were recorded with
        #[arg(long)]
        protocol: Protocol,

        /// Label for the report header [default: Total <PROTOCOL>]
        #[arg(long)]
        label: Option<String>,

        /// Run bucket files written by `tracelat run`
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        let error = Style::new().bold().fg_color(Some(AnsiColor::Red.into()));
        anstream::eprintln!("{error}error:{error:#} {e:#}");
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config =
        AnalysisConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Run {
            base_dir,
            experiment,
            protocols,
            runs,
            output_dir,
        } => {
            if let Some(runs) = runs {
                config.runs = runs;
            }
            if output_dir.is_some() {
                config.output_dir = output_dir;
            }
            let protocols = if protocols.is_empty() {
                config.protocols.clone()
            } else {
                protocols
            };

            let experiment = Experiment::new(base_dir, experiment);
            for protocol in protocols {
                writeln!(out, "Processing protocol: {protocol}")?;
                experiment::run_protocol(&experiment, protocol, &config, &mut out)?;
            }
        }
        Commands::Report { protocol, files } => {
            let (buckets, summary) =
                experiment::classify_files(protocol, &files, config.duration_ceiling_us);
            if summary.files_loaded == 0 {
                anyhow::bail!("none of the {} batch files could be read", files.len());
            }
            let report = tracelat::trace::analyze(protocol.to_string(), &buckets, config.window());
            experiment::write_block(&mut out, &report)?;
        }
        Commands::Aggregate {
            protocol,
            label,
            files,
        } => {
            let label = label.unwrap_or_else(|| format!("Total {protocol}"));
            let report = experiment::aggregate_run_files(label, protocol, &files, &config);
            experiment::write_block(&mut out, &report)?;
        }
    }

    out.flush()?;
    Ok(())
}
