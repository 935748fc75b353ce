//! avro-bandwidth - Avro container read throughput benchmark
//!
//! Entry point for the CLI application.

use anyhow::{anyhow, Context, Result};
use avro_bandwidth::config::{CliArgs, LogFormat, ScanConfig};
use avro_bandwidth::progress::{print_header, print_summary};
use avro_bandwidth::scanner::Scanner;
use avro_bandwidth::store::{LocalStore, ObjectStore};
use clap::Parser;
use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.log_format, args.log_level())?;

    // Validate and create config
    let config = ScanConfig::from_args(args).context("Invalid configuration")?;

    info!("start");

    let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(&config.root));
    let scanner = Scanner::from_listing(
        store,
        &config.container,
        &config.prefix,
        |name| config.is_included(name),
        config.scan_options(),
    )
    .with_context(|| format!("Failed to prepare scan of container '{}'", config.container))?;

    if !config.quiet {
        let objects = scanner.objects();
        print_header(
            &format!(
                "{}/{}/{}",
                config.root.display(),
                config.container,
                config.prefix
            ),
            config.worker_count,
            config.buffer_size,
            objects.len(),
            objects.iter().map(|o| o.size).sum(),
        );
    }

    // Setup signal handler for graceful shutdown
    let shutdown_flag = scanner.shutdown_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let summary = scanner.run().context("Scan failed")?;

    if !config.quiet {
        print_summary(&summary);
    }

    if summary.objects_abandoned > 0 {
        info!(
            abandoned = summary.objects_abandoned,
            "Scan completed with abandoned objects"
        );
    }

    Ok(())
}

fn setup_logging(format: LogFormat, level: &str) -> Result<()> {
    let filter = EnvFilter::new(format!("avro_bandwidth={level},warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let result = match format {
        LogFormat::Default => builder.with_ansi(std::io::stderr().is_terminal()).try_init(),
        LogFormat::Text => builder.with_ansi(false).try_init(),
        LogFormat::Color => builder.with_ansi(true).try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| anyhow!("Failed to initialize logging: {e}"))
}
