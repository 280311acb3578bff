//! sizesync - pull the files whose size differs on an SSH remote
//!
//! Lists every file present on both sides with a different size, asks which
//! ones to download, then fetches them four at a time.

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::style::{Color, Stylize};
use std::process::ExitCode;
use std::sync::Arc;

use sizesync::cli::Args;
use sizesync::config::{default_config_path, SshConfig};
use sizesync::logger::{Logger, NoopLogger, TextLogger};
use sizesync::select::TerminalSelection;
use sizesync::ssh::SshConnector;
use sizesync::sync::{SyncOutcome, Synchronizer};

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    // Set up Ctrl-C handler
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nInterrupted by user. Exiting (Ctrl-C)...");
        // Exit immediately with 130 (128 + SIGINT)
        std::process::exit(130);
    }) {
        log::warn!("Could not install Ctrl-C handler: {}", e);
    }

    match run(&args) {
        Ok(outcome) => {
            report(&outcome);
            ExitCode::from(outcome.exit_code())
        }
        Err(e) => {
            eprintln!("{} {:#}", "error:".with(Color::Red).bold(), e);
            ExitCode::from(1)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();
}

fn run(args: &Args) -> Result<SyncOutcome> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let config = SshConfig::load(&config_path).context("Failed to load configuration")?;

    // Choose logger once; zero overhead in hot paths with NoopLogger
    let logger: Arc<dyn Logger> = match args.log_file {
        Some(ref p) => match TextLogger::new(p) {
            Ok(l) => Arc::new(l),
            Err(e) => {
                log::warn!("Event log {} unavailable: {}", p.display(), e);
                Arc::new(NoopLogger)
            }
        },
        None => Arc::new(NoopLogger),
    };

    log::info!(
        "Comparing {} with {}@{}:{}",
        args.local_path.display(),
        config.username,
        config.address(),
        args.remote_path
    );
    let workers = config.workers;
    let connector = SshConnector::new(config);
    let mut selection = TerminalSelection::stdio();

    let outcome = Synchronizer::new(&connector, workers, &*logger)
        .with_progress(true)
        .run(&args.local_path, &args.remote_path, &mut selection)?;
    Ok(outcome)
}

fn report(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::NothingToSync => {
            println!("Nothing to synchronize: all shared files match in size.");
        }
        SyncOutcome::Completed(summary) if summary.is_success() => {
            println!("{} {}", "Completed".with(Color::Green).bold(), summary);
        }
        SyncOutcome::Completed(summary) => {
            println!("{} {}", "Incomplete".with(Color::Red).bold(), summary);
        }
    }
}
