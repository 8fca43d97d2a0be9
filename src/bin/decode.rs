//! A7: binary entry point. Wires CLI/config (A1), logging (A2), the catalog
//! (A5), the worker pool (A6), and an `ArchiveWriter` (A4) together: open
//! the input file, drive the DATE framer, fan out through the worker pool,
//! report exit status per §6.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

use next_raw_decoder::assembler::DecoderContext;
use next_raw_decoder::catalog::{Catalog, InMemoryCatalog};
use next_raw_decoder::config::Configuration;
use next_raw_decoder::date::pre_pass;
use next_raw_decoder::worker;
use next_raw_decoder::writer::{ArchiveWriter, NullWriter};

/// Decode a DATE-framed DAQ raw event file into a structured event archive.
#[derive(Parser, Debug)]
#[clap(about, version)]
struct Cli {
    /// Input DATE file.
    #[clap(long, value_parser)]
    file_in: Option<PathBuf>,

    /// Output archive path (unused by the reference `NullWriter`; a real
    /// `ArchiveWriter` implementation would consume this).
    #[clap(long, value_parser)]
    file_out: Option<PathBuf>,

    /// JSON catalog file (Huffman codebooks + sensor mapping) standing in
    /// for the out-of-scope database backend.
    #[clap(long, value_parser)]
    catalog: PathBuf,

    /// Optional JSON `Configuration` file; CLI flags below override it.
    #[clap(long, value_parser)]
    config: Option<PathBuf>,

    #[clap(long, value_parser)]
    max_events: Option<i64>,

    #[clap(long, value_parser)]
    skip: Option<i64>,

    #[clap(long, value_parser)]
    num_workers: Option<usize>,

    #[clap(long)]
    discard_on_error: bool,

    #[clap(long, default_value_t = false)]
    no_pmts: bool,

    #[clap(long, default_value_t = false)]
    no_sipms: bool,

    #[clap(long, default_value_t = false)]
    no_trigger: bool,
}

fn build_configuration(cli: &Cli) -> Result<Configuration, std::io::Error> {
    let mut config = match &cli.config {
        Some(path) => Configuration::from_json_file(path)?,
        None => Configuration::default(),
    };

    if let Some(file_in) = &cli.file_in {
        config.file_in = file_in.to_string_lossy().into_owned();
    }
    if let Some(file_out) = &cli.file_out {
        config.file_out = file_out.to_string_lossy().into_owned();
    }
    if let Some(max_events) = cli.max_events {
        config.max_events = max_events;
    }
    if let Some(skip) = cli.skip {
        config.skip = skip;
    }
    if let Some(num_workers) = cli.num_workers {
        config.num_workers = num_workers;
    }
    if cli.discard_on_error {
        config.discard_on_error = true;
    }
    if cli.no_pmts {
        config.read_pmts = false;
    }
    if cli.no_sipms {
        config.read_sipms = false;
    }
    if cli.no_trigger {
        config.read_trigger = false;
    }

    Ok(config)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match build_configuration(&cli) {
        Ok(config) => config,
        Err(err) => {
            error!("failed to load configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    let data = match std::fs::read(&config.file_in) {
        Ok(data) => data,
        Err(err) => {
            error!("failed to read input file {:?}: {err}", config.file_in);
            return ExitCode::FAILURE;
        }
    };

    let catalog = match InMemoryCatalog::from_json_file(&cli.catalog) {
        Ok(catalog) => catalog,
        Err(err) => {
            error!("failed to load catalog {:?}: {err}", cli.catalog);
            return ExitCode::FAILURE;
        }
    };

    let summary = pre_pass(&data);
    let run_number = match summary.run_number {
        Some(run_number) => run_number,
        None => {
            error!("no valid PHYSICS_EVENT/CALIBRATION_EVENT found in {:?}", config.file_in);
            return ExitCode::FAILURE;
        }
    };
    info!(
        "run {run_number}: {} valid events found in pre-pass",
        summary.valid_event_count
    );

    let (pmt_trie, sipm_trie, sensors_map) = match catalog.load(run_number) {
        Ok(v) => v,
        Err(err) => {
            error!("catalog load failed for run {run_number}: {err}");
            return ExitCode::FAILURE;
        }
    };
    let pmt_trie = Arc::new(pmt_trie);
    let sipm_trie = Arc::new(sipm_trie);
    let sensors_map = Arc::new(sensors_map);

    let writer: Box<dyn ArchiveWriter> = Box::new(NullWriter);

    let num_workers = config.num_workers;
    let max_events = config.max_events;
    let skip = config.skip;
    let context_config = config.clone();

    let written = worker::run(
        &data,
        num_workers,
        max_events,
        skip,
        move || {
            DecoderContext::new(
                Arc::clone(&pmt_trie),
                Arc::clone(&sipm_trie),
                Arc::clone(&sensors_map),
                context_config.clone(),
            )
        },
        writer.as_ref(),
    );

    info!("decoded {written} events from {:?}", config.file_in);
    ExitCode::SUCCESS
}
