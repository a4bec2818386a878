//! HTTP front door for the search gateway.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use placefinder_core::{RankedMirror, SearchParams};
use placefinder_data::{Gateway, GatewayReply};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::settings::{DefaultGatewayBuilder, GatewayBuilder, GatewayOverrides, GatewaySettings};
use crate::{
    ARG_CACHE_DIR, ARG_DEADLINE_SECS, ARG_JOURNAL, ARG_LISTEN, ARG_MIRRORS, ARG_STATE_DIR,
    ARG_STATS_DB, CliError,
};

/// Address used when no `--listen` value is configured.
pub(crate) const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

/// Response header naming where a search body came from.
pub(crate) const ORIGIN_HEADER: HeaderName = HeaderName::from_static("x-placefinder-origin");

/// CLI arguments for the `serve` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Serve the search gateway over HTTP. GET /api/search accepts \
                 the search, bbox and limit query parameters; GET /api/mirrors \
                 reports the current mirror ranking.",
    about = "Serve the search gateway over HTTP"
)]
#[ortho_config(prefix = "PLACEFINDER")]
pub(crate) struct ServeArgs {
    /// Socket address to listen on.
    #[arg(long = ARG_LISTEN, value_name = "addr")]
    #[serde(default)]
    pub(crate) listen: Option<String>,
    /// Comma-separated Overpass mirror URLs, best first.
    #[arg(long = ARG_MIRRORS, value_name = "urls")]
    #[serde(default)]
    pub(crate) mirrors: Option<String>,
    /// Directory for the default cache and statistics locations.
    #[arg(long = ARG_STATE_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) state_dir: Option<Utf8PathBuf>,
    /// Override the disk cache directory.
    #[arg(long = ARG_CACHE_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) cache_dir: Option<Utf8PathBuf>,
    /// Override the mirror statistics database.
    #[arg(long = ARG_STATS_DB, value_name = "path")]
    #[serde(default)]
    pub(crate) stats_db: Option<Utf8PathBuf>,
    /// Append request journal lines to this file.
    #[arg(long = ARG_JOURNAL, value_name = "path")]
    #[serde(default)]
    pub(crate) journal: Option<Utf8PathBuf>,
    /// End-to-end fetch deadline in seconds; 0 disables it.
    #[arg(long = ARG_DEADLINE_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) deadline_secs: Option<u64>,
}

impl ServeArgs {
    pub(crate) fn into_config(self) -> Result<ServeConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ServeConfig::try_from(merged)
    }
}

/// Resolved `serve` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServeConfig {
    pub(crate) listen: SocketAddr,
    pub(crate) gateway: GatewaySettings,
}

impl TryFrom<ServeArgs> for ServeConfig {
    type Error = CliError;

    fn try_from(args: ServeArgs) -> Result<Self, Self::Error> {
        let value = args.listen.unwrap_or_else(|| DEFAULT_LISTEN.to_owned());
        let listen = value
            .parse()
            .map_err(|source| CliError::InvalidListenAddress { value, source })?;
        let gateway = GatewaySettings::from(GatewayOverrides {
            mirrors: args.mirrors,
            state_dir: args.state_dir,
            cache_dir: args.cache_dir,
            stats_db: args.stats_db,
            journal: args.journal,
            deadline_secs: args.deadline_secs,
        });
        Ok(Self { listen, gateway })
    }
}

pub(crate) async fn run_serve(args: ServeArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    let gateway = DefaultGatewayBuilder.build(&config.gateway.gateway_config())?;
    let listener = TcpListener::bind(config.listen)
        .await
        .map_err(|source| CliError::Bind {
            addr: config.listen,
            source,
        })?;
    log::info!(
        "serving {} mirrors on http://{}",
        gateway.mirrors().len(),
        config.listen
    );
    axum::serve(listener, router(Arc::new(gateway)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(CliError::Serve)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    log::info!("shutting down");
}

/// Routes for the HTTP front door.
pub(crate) fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/api/search", get(search))
        .route("/api/mirrors", get(mirrors))
        .route("/healthz", get(health))
        .with_state(gateway)
}

async fn search(
    State(gateway): State<Arc<Gateway>>,
    Query(params): Query<SearchParams>,
) -> Response {
    reply_response(gateway.search(&params).await)
}

fn reply_response(reply: GatewayReply) -> Response {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let origin = HeaderValue::from_static(reply.origin.as_str());
    (
        status,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (ORIGIN_HEADER, origin),
        ],
        reply.body,
    )
        .into_response()
}

async fn mirrors(State(gateway): State<Arc<Gateway>>) -> Json<Vec<RankedMirror>> {
    Json(gateway.mirror_report().await)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    mirrors: usize,
}

async fn health(State(gateway): State<Arc<Gateway>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        mirrors: gateway.mirrors().len(),
    })
}
