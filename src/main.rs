use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};

use gisync::Scanner;

#[derive(Parser)]
#[command(name = "gisync")]
#[command(version)]
#[command(about = "Produce a checksummed inventory of a GIS project directory")]
struct Cli {
    /// Project root to scan
    #[arg(value_name = "PATH", default_value = ".")]
    path: PathBuf,

    /// Skip checksum computation (paths, sizes and mtimes only)
    #[arg(long)]
    no_checksum: bool,

    /// External GeoPackage hashing tool (defaults to $GISYNC_DBHASH)
    #[arg(long, value_name = "CMD")]
    dbhash: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv for more)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
}

/// Default filter level for the given number of `-v` flags; RUST_LOG still
/// takes precedence when set.
fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level(cli.verbose))),
        )
        .with_writer(std::io::stderr)
        .init();

    let dbhash = cli
        .dbhash
        .or_else(|| std::env::var_os("GISYNC_DBHASH").map(PathBuf::from));

    let mut scanner = Scanner::new(&cli.path);
    if let Some(command) = dbhash {
        scanner = scanner.dbhash(command);
    }

    let inventory = scanner
        .scan(!cli.no_checksum)
        .with_context(|| format!("scanning {}", cli.path.display()))?;

    let stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(stdout, &inventory)?;
    println!();
    Ok(())
}
