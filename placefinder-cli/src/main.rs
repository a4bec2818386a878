//! Entry point for the `placefinder` binary.
#![forbid(unsafe_code)]

use placefinder_cli::{CliError, run};

fn main() -> eyre::Result<()> {
    match run() {
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        other => other.map_err(eyre::Report::new),
    }
}
