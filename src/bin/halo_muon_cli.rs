use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use halo_muon_selection::calibration::BadChannelSet;
use halo_muon_selection::error::{log_calibration_error, log_store_error};
use halo_muon_selection::fixtures::synthetic::{SyntheticConfig, SyntheticGenerator};
use halo_muon_selection::fixtures::{read_events, write_events, write_json_lines};
use halo_muon_selection::{init_logging, run_pass, AppConfig, PassStore, PassSummary};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "halo_muon_cli",
    about = "Halo-muon event selection and calorimeter calibration passes"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run selection passes over a JSON Lines event file
    Select {
        /// Events, one JSON record per line
        events: PathBuf,
        /// Directory holding per-pass tables
        #[arg(long, default_value = "selection_output")]
        store: PathBuf,
        /// Delete existing pass tables and start again from pass 0
        #[arg(long)]
        restart: bool,
        /// Number of passes to run back to back
        #[arg(long, default_value_t = 1)]
        passes: u32,
        /// Worker threads (defaults to the config value)
        #[arg(long)]
        workers: Option<usize>,
        /// JSON list of [module, sector] bad channels
        #[arg(long)]
        bad_channels: Option<PathBuf>,
        /// Write the accepted events of the last pass as JSON Lines
        #[arg(long)]
        accepted_out: Option<PathBuf>,
        /// Threshold and binning configuration
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Write a seeded synthetic event file
    Simulate {
        #[arg(long, default_value_t = 1000)]
        events: usize,
        #[arg(long, default_value_t = 1)]
        seed: u64,
        /// Generator settings as JSON
        #[arg(long)]
        config: Option<PathBuf>,
        output: PathBuf,
    },
    /// Print the summary of a stored pass
    Summary {
        #[arg(long, default_value = "selection_output")]
        store: PathBuf,
        /// Pass number (defaults to the latest)
        #[arg(long)]
        pass: Option<u32>,
    },
}

#[derive(Serialize)]
struct PassLine<'a> {
    pass: u32,
    tables: &'a Path,
    summary: PassSummary,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Select {
            events,
            store,
            restart,
            passes,
            workers,
            bad_channels,
            accepted_out,
            config,
        } => run_select(SelectArgs {
            events,
            store,
            restart,
            passes,
            workers,
            bad_channels,
            accepted_out,
            config,
        }),
        Commands::Simulate {
            events,
            seed,
            config,
            output,
        } => run_simulate(events, seed, config, &output),
        Commands::Summary { store, pass } => run_summary(&store, pass),
    }
}

struct SelectArgs {
    events: PathBuf,
    store: PathBuf,
    restart: bool,
    passes: u32,
    workers: Option<usize>,
    bad_channels: Option<PathBuf>,
    accepted_out: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn run_select(args: SelectArgs) -> Result<ExitCode> {
    let config = args
        .config
        .as_ref()
        .map(AppConfig::load_from_file)
        .unwrap_or_default();
    let workers = args.workers.unwrap_or(config.run.workers);

    let bad = match &args.bad_channels {
        Some(path) => BadChannelSet::load_from_file(path).map_err(|err| {
            log_store_error(&err, "load_bad_channels");
            err
        })?,
        None => BadChannelSet::new(),
    };

    let store = PassStore::new(&args.store);
    if args.restart {
        store.clear().map_err(|err| {
            log_store_error(&err, "restart");
            err
        })?;
    }

    let events = read_events(&args.events)?;

    for _ in 0..args.passes.max(1) {
        let (pass, inputs) = store.load_inputs(bad.clone(), &config).map_err(|err| {
            log_store_error(&err, "load_inputs");
            err
        })?;

        let report = run_pass(Arc::new(inputs), &events, workers).map_err(|err| {
            log_calibration_error(&err, "run_pass");
            err
        })?;

        let path = store.write_pass(pass, &report).map_err(|err| {
            log_store_error(&err, "write_pass");
            err
        })?;

        if let Some(out) = &args.accepted_out {
            write_json_lines(out, &report.accepted)
                .with_context(|| format!("writing accepted events to {}", out.display()))?;
        }

        let line = PassLine {
            pass,
            tables: &path,
            summary: report.summary(),
        };
        println!("{}", serde_json::to_string(&line)?);
    }

    Ok(ExitCode::from(0))
}

fn run_simulate(
    events: usize,
    seed: u64,
    config_path: Option<PathBuf>,
    output: &Path,
) -> Result<ExitCode> {
    let mut config = match config_path {
        Some(path) => {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("reading generator config {}", path.display()))?;
            serde_json::from_str::<SyntheticConfig>(&contents)
                .with_context(|| format!("parsing generator config {}", path.display()))?
        }
        None => SyntheticConfig::default(),
    };
    config.events = events;

    let records = SyntheticGenerator::new(config, seed)
        .context("invalid generator noise or muon energy settings")?
        .generate();
    write_events(output, &records)?;
    println!(
        "{}",
        serde_json::json!({ "events": records.len(), "output": output })
    );
    Ok(ExitCode::from(0))
}

fn run_summary(store_root: &Path, pass: Option<u32>) -> Result<ExitCode> {
    let store = PassStore::new(store_root);
    let pass = match pass {
        Some(pass) => pass,
        None => match store.latest_pass()? {
            Some(pass) => pass,
            None => {
                eprintln!("No passes under {}", store_root.display());
                return Ok(ExitCode::from(1));
            }
        },
    };

    let tables = store.load_pass(pass).map_err(|err| {
        log_store_error(&err, "summary");
        err
    })?;
    let line = serde_json::json!({
        "pass": pass,
        "tables": store.pass_path(pass),
        "summary": tables.summary,
        "calibration": tables.calibration,
    });
    println!("{}", line);
    Ok(ExitCode::from(0))
}
