//! Stub gateway wiring shared by the command tests.

use std::sync::Arc;

use placefinder_core::MirrorEndpoint;
use placefinder_data::test_support::{StubReply, StubTransport};
use placefinder_data::{
    CacheManager, CacheTier, Gateway, GatewayComponents, GatewayConfig, MemoryCache,
    MemoryStatsStore, NullRequestLog,
};

use crate::CliError;
use crate::settings::{GatewayBuilder, GatewayOverrides, GatewaySettings};

pub(super) const MIRROR: &str = "https://stub.test/api/interpreter";
pub(super) const EIFFEL_TOWER: &str = r#"{"version":0.6,"elements":[
    {"type":"node","id":5013364,"lat":48.8582602,"lon":2.2944991,
     "tags":{"name":"Eiffel Tower","tourism":"attraction"}}
]}"#;

/// Builds gateways over a scripted transport and in-memory storage.
pub(super) struct StubGatewayBuilder {
    pub(super) transport: Arc<StubTransport>,
    pub(super) stats: Arc<MemoryStatsStore>,
}

impl StubGatewayBuilder {
    pub(super) fn scripted(replies: Vec<StubReply>) -> Self {
        let transport = StubTransport::new().with_script(&MirrorEndpoint::from(MIRROR), replies);
        Self {
            transport: Arc::new(transport),
            stats: Arc::new(MemoryStatsStore::new()),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.transport.total_calls()
    }
}

impl GatewayBuilder for StubGatewayBuilder {
    fn build(&self, config: &GatewayConfig) -> Result<Gateway, CliError> {
        let tiers: Vec<Box<dyn CacheTier>> = vec![Box::new(MemoryCache::new(8))];
        let gateway = Gateway::with_components(
            config,
            GatewayComponents {
                transport: self.transport.clone(),
                stats: self.stats.clone(),
                cache: CacheManager::new(tiers),
                journal: Arc::new(NullRequestLog),
            },
        )?;
        Ok(gateway)
    }
}

/// Settings pointing at the stub mirror only.
pub(super) fn stub_settings() -> GatewaySettings {
    GatewaySettings::from(GatewayOverrides {
        mirrors: Some(MIRROR.to_owned()),
        ..GatewayOverrides::default()
    })
}
