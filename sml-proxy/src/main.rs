//! Binary entrypoint for the SML-to-HTTP proxy
//!
//! `--config <path>` runs the service: one reader task per configured
//! meter plus the HTTP exporter. `--dump <path>` decodes SML frames from a
//! recorded file, prints them as JSON, and exits.

mod config;
mod image;
mod meter;
mod web;

use clap::Parser;
use config::Config;
use image::ProcessImageStore;
use meter::MeterManager;
use sml_codec::SmlReader;
use sml_core::SmlError;
use sml_transport::IoSource;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use web::WebExporter;

#[derive(Parser)]
#[command(name = "sml-proxy")]
#[command(about = "Publishes SML meter readings over HTTP as JSON")]
#[command(version)]
struct Cli {
    /// Configuration file to run the service with
    #[arg(long)]
    config: Option<PathBuf>,

    /// Decode SML frames from a file, print them to stdout, and exit
    #[arg(long)]
    dump: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Some(path) = cli.dump {
        return dump_file(&path).await;
    }

    let Some(path) = cli.config else {
        use clap::CommandFactory;
        let _ = Cli::command().print_help();
        return ExitCode::SUCCESS;
    };

    match run(&path).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("fatal: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;

    let store = Arc::new(ProcessImageStore::new(&config));
    let exporter = WebExporter::new(store.clone(), config.web.clone());
    let meters = MeterManager::new(config.meters, store);

    // Both subsystems run until failure; the first error tears down the
    // process.
    tokio::select! {
        result = exporter.serve() => result,
        result = meters.run() => result,
    }
}

async fn dump_file(path: &Path) -> ExitCode {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) => {
            eprintln!("failed to open dump file: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut reader = SmlReader::new(IoSource::new(file));
    let mut dumped_any = false;

    loop {
        match reader.read_file().await {
            Ok(file) => {
                dumped_any = true;
                match serde_json::to_string_pretty(&file) {
                    Ok(json) => println!("found file:\n{}\n", json),
                    Err(e) => {
                        eprintln!("failed to serialize decoded file: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            }
            Err(SmlError::Source(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => {
                eprintln!("failed to read from file: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    if dumped_any {
        ExitCode::SUCCESS
    } else {
        eprintln!("no valid SML files found in file");
        ExitCode::from(2)
    }
}
