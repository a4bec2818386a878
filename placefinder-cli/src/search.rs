//! Search command implementation for the Placefinder CLI.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use placefinder_core::SearchParams;
use placefinder_data::GatewayReply;
use serde::{Deserialize, Serialize};

use crate::settings::{DefaultGatewayBuilder, GatewayBuilder, GatewayOverrides, GatewaySettings};
use crate::{
    ARG_BBOX, ARG_CACHE_DIR, ARG_DEADLINE_SECS, ARG_JOURNAL, ARG_LIMIT, ARG_MIRRORS, ARG_SEARCH,
    ARG_STATE_DIR, ARG_STATS_DB, CliError, ENV_SEARCH,
};

/// CLI arguments for the `search` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Look up points of interest by name through the Overpass \
                 mirror pool. Replies are cached on disk and mirror health \
                 is recorded between runs. The JSON reply is printed to \
                 standard output.",
    about = "Search for points of interest by name"
)]
#[ortho_config(prefix = "PLACEFINDER")]
pub(crate) struct SearchArgs {
    /// Place name to look up.
    #[arg(long = ARG_SEARCH, value_name = "term")]
    #[serde(default)]
    pub(crate) search: Option<String>,
    /// Bounding box as "south,west,north,east".
    #[arg(long = ARG_BBOX, value_name = "s,w,n,e", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) bbox: Option<String>,
    /// Maximum number of results.
    #[arg(long = ARG_LIMIT, value_name = "n")]
    #[serde(default)]
    pub(crate) limit: Option<String>,
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

impl SearchArgs {
    pub(crate) fn into_config(self) -> Result<SearchConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SearchConfig::try_from(merged)
    }
}

/// Resolved `search` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SearchConfig {
    /// Parameters handed to the gateway unchanged.
    pub(crate) params: SearchParams,
    /// Gateway wiring.
    pub(crate) gateway: GatewaySettings,
}

impl TryFrom<SearchArgs> for SearchConfig {
    type Error = CliError;

    fn try_from(args: SearchArgs) -> Result<Self, Self::Error> {
        let search = args.search.ok_or(CliError::MissingArgument {
            field: ARG_SEARCH,
            env: ENV_SEARCH,
        })?;
        let gateway = GatewaySettings::from(GatewayOverrides {
            mirrors: args.mirrors,
            state_dir: args.state_dir,
            cache_dir: args.cache_dir,
            stats_db: args.stats_db,
            journal: args.journal,
            deadline_secs: args.deadline_secs,
        });
        Ok(Self {
            params: SearchParams {
                search: Some(search),
                bbox: args.bbox,
                limit: args.limit,
            },
            gateway,
        })
    }
}

pub(crate) async fn run_search(args: SearchArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    let mut output = Vec::new();
    let outcome = run_search_with(&config, &DefaultGatewayBuilder, &mut output).await;
    std::io::stdout()
        .lock()
        .write_all(&output)
        .map_err(CliError::WriteSearchOutput)?;
    outcome
}

/// Run one search and write the reply body to `writer`.
///
/// The body is written even when the reply is an error so callers always
/// see the structured diagnostic; the error status is then reported as
/// [`CliError::SearchFailed`].
pub(crate) async fn run_search_with(
    config: &SearchConfig,
    builder: &dyn GatewayBuilder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let gateway = builder.build(&config.gateway.gateway_config())?;
    let reply = gateway.search(&config.params).await;
    log::debug!(
        "search answered with HTTP {} from {}",
        reply.status,
        reply.origin
    );
    write_reply(writer, &reply)?;
    if reply.is_success() {
        Ok(())
    } else {
        Err(CliError::SearchFailed {
            status: reply.status,
            origin: reply.origin,
        })
    }
}

fn write_reply(writer: &mut dyn Write, reply: &GatewayReply) -> Result<(), CliError> {
    writer
        .write_all(&reply.body)
        .map_err(CliError::WriteSearchOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteSearchOutput)?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<SearchConfig, CliError> {
    let merged = SearchArgs::merge_from_layers(layers).map_err(CliError::from)?;
    SearchConfig::try_from(merged)
}
