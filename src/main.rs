//! journalbeat: ships systemd journal entries to Elasticsearch.
//!
//! Follows the journal, turns every entry into a JSON document, and indexes
//! it. The cursor of the last delivered entry is kept in a file so a restart
//! picks up where the previous run left off.

use clap::Parser;
use snafu::prelude::*;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use journalbeat::config::{Config, DEFAULT_CONFIG};
use journalbeat::error::{ConfigSnafu, PipelineError};
use journalbeat::run_pipeline;

/// Ship systemd journal entries to Elasticsearch.
#[derive(Parser, Debug)]
#[command(name = "journalbeat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Print a sample configuration and exit.
    #[arg(long)]
    print_config: bool,

    /// Normalize entries without sending them or moving the cursor.
    /// Implies --debug.
    #[arg(long)]
    noop: bool,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    let args = Args::parse();

    if args.print_config {
        print!("{}", Config::sample().to_yaml().context(ConfigSnafu)?);
        return Ok(());
    }

    let level = if args.debug || args.noop {
        "debug"
    } else {
        args.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("journalbeat starting");

    let mut config = Config::from_file(&args.config).context(ConfigSnafu)?;
    config.dry_run |= args.noop;

    info!(
        url = %config.sink.url,
        index = %config.sink.name,
        cursor_file = %config.cursor_file.display(),
        dry_run = config.dry_run,
        "Configuration loaded"
    );

    run_pipeline(config).await?;
    Ok(())
}
