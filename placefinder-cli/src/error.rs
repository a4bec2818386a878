//! Error types emitted by the Placefinder CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>`.

use std::net::SocketAddr;
use std::sync::Arc;

use placefinder_data::{GatewayBuildError, ReplyOrigin};
use thiserror::Error;

/// Errors emitted by the Placefinder CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// The listen address could not be parsed.
    #[error("invalid listen address {value:?}: {source}")]
    InvalidListenAddress {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
    /// The async runtime could not be started.
    #[error("failed to start the async runtime: {0}")]
    BuildRuntime(#[source] std::io::Error),
    /// The gateway rejected its configuration or storage failed to open.
    #[error("failed to build the search gateway: {0}")]
    BuildGateway(#[from] GatewayBuildError),
    /// Binding the HTTP listener failed.
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// The HTTP server stopped with an error.
    #[error("HTTP server failed: {0}")]
    Serve(#[source] std::io::Error),
    /// Writing the search output failed.
    #[error("failed to write search output: {0}")]
    WriteSearchOutput(#[source] std::io::Error),
    /// The search completed with a non-success reply.
    #[error("search failed with HTTP {status} ({origin})")]
    SearchFailed { status: u16, origin: ReplyOrigin },
}
