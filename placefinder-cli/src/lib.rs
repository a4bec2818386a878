//! Command-line and HTTP front doors for the Placefinder search gateway.
#![forbid(unsafe_code)]

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

mod error;
mod search;
mod serve;
mod settings;

pub use error::CliError;

use search::SearchArgs;
use serve::ServeArgs;

const ARG_SEARCH: &str = "search";
const ARG_BBOX: &str = "bbox";
const ARG_LIMIT: &str = "limit";
const ARG_MIRRORS: &str = "mirrors";
const ARG_STATE_DIR: &str = "state-dir";
const ARG_CACHE_DIR: &str = "cache-dir";
const ARG_STATS_DB: &str = "stats-db";
const ARG_JOURNAL: &str = "journal";
const ARG_DEADLINE_SECS: &str = "deadline-secs";
const ARG_LISTEN: &str = "listen";
const ENV_SEARCH: &str = "PLACEFINDER_CMDS_SEARCH_SEARCH";

/// Run the Placefinder CLI with the current process arguments and
/// environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    init_logging(cli.verbose);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::BuildRuntime)?;
    match cli.command {
        Command::Search(args) => runtime.block_on(search::run_search(args)),
        Command::Serve(args) => runtime.block_on(serve::run_serve(args)),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "placefinder",
    about = "Point-of-interest search over a pool of Overpass mirrors",
    version
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a single search and print the JSON reply.
    Search(SearchArgs),
    /// Serve searches over HTTP.
    Serve(ServeArgs),
}

const fn verbosity_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the stderr subscriber. `RUST_LOG` directives refine the level
/// chosen with `-v`; `log` records are forwarded to the subscriber.
fn init_logging(verbose: u8) {
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity_level(verbose).into())
        .from_env_lossy();
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        log::debug!("logging already initialised: {err}");
    }
}

#[cfg(test)]
mod tests;
