//! Gateway settings shared by the `search` and `serve` subcommands.

use std::time::Duration;

use camino::Utf8PathBuf;
use placefinder_data::{Gateway, GatewayConfig};

use crate::CliError;

/// Directory holding the cache and statistics when no paths are given.
pub(crate) const DEFAULT_STATE_DIR: &str = ".placefinder";
const CACHE_DIR_NAME: &str = "cache";
const STATS_DB_NAME: &str = "stats.sqlite";

/// Gateway options exactly as merged from files, environment and flags.
#[derive(Debug, Clone, Default)]
pub(crate) struct GatewayOverrides {
    pub(crate) mirrors: Option<String>,
    pub(crate) state_dir: Option<Utf8PathBuf>,
    pub(crate) cache_dir: Option<Utf8PathBuf>,
    pub(crate) stats_db: Option<Utf8PathBuf>,
    pub(crate) journal: Option<Utf8PathBuf>,
    pub(crate) deadline_secs: Option<u64>,
}

/// Resolved gateway settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GatewaySettings {
    /// Mirror URLs in tie-break order; `None` keeps the built-in list.
    pub(crate) mirrors: Option<Vec<String>>,
    /// Directory for the disk response cache.
    pub(crate) cache_dir: Utf8PathBuf,
    /// SQLite database for mirror statistics.
    pub(crate) stats_db: Utf8PathBuf,
    /// Request journal file; `None` routes journal lines to the log.
    pub(crate) journal: Option<Utf8PathBuf>,
    /// End-to-end fetch deadline; `None` keeps the default and zero
    /// disables it.
    pub(crate) deadline: Option<Duration>,
}

impl From<GatewayOverrides> for GatewaySettings {
    fn from(overrides: GatewayOverrides) -> Self {
        let state_dir = overrides
            .state_dir
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_STATE_DIR));
        let cache_dir = overrides
            .cache_dir
            .unwrap_or_else(|| state_dir.join(CACHE_DIR_NAME));
        let stats_db = overrides
            .stats_db
            .unwrap_or_else(|| state_dir.join(STATS_DB_NAME));
        Self {
            mirrors: overrides.mirrors.as_deref().map(split_mirrors),
            cache_dir,
            stats_db,
            journal: overrides.journal,
            deadline: overrides.deadline_secs.map(Duration::from_secs),
        }
    }
}

impl GatewaySettings {
    /// Translate the settings into a gateway configuration.
    pub(crate) fn gateway_config(&self) -> GatewayConfig {
        let mut config = GatewayConfig::default()
            .with_cache_dir(self.cache_dir.clone())
            .with_stats_path(self.stats_db.clone());
        if let Some(mirrors) = &self.mirrors {
            config = config.with_mirrors(mirrors.iter().cloned());
        }
        if let Some(journal) = &self.journal {
            config = config.with_journal_path(journal.clone());
        }
        if let Some(deadline) = self.deadline {
            let retry = config
                .retry
                .with_deadline((!deadline.is_zero()).then_some(deadline));
            config = config.with_retry(retry);
        }
        config
    }
}

/// Comma-separated mirror list; blank entries are dropped.
fn split_mirrors(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|mirror| !mirror.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Builds the gateway for the current invocation.
pub(crate) trait GatewayBuilder {
    fn build(&self, config: &GatewayConfig) -> Result<Gateway, CliError>;
}

/// Builds a gateway that talks to real mirrors and opens on-disk storage.
pub(crate) struct DefaultGatewayBuilder;

impl GatewayBuilder for DefaultGatewayBuilder {
    fn build(&self, config: &GatewayConfig) -> Result<Gateway, CliError> {
        Ok(Gateway::from_config(config)?)
    }
}
