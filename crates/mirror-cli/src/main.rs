//! Mirror CLI - command-line front end for the mirror engine.
//!
//! Every command prints its result as pretty JSON on stdout; logs go to
//! stderr.

mod commands;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use commands::Command;

#[derive(Parser, Debug)]
#[command(name = "mirror")]
#[command(about = "Reconcile and prune a local mirror of catalog model artifacts")]
struct Args {
    /// Mirror root directory
    #[arg(long, env = "MIRROR_BASE_DIR", default_value = ".")]
    base_dir: PathBuf,

    /// SQLite database file (defaults to <base-dir>/mirror.db)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    debug!("Mirror root: {}", args.base_dir.display());

    let mut builder = mirror_core::MirrorApi::builder(&args.base_dir);
    if let Some(database) = args.database {
        builder = builder.database_path(database);
    }
    let api = builder.build().await?;

    let output = commands::run(&api, args.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
