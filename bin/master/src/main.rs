//! Orchestrator process.
//!
//! Assembles the broker adapter, snapshot cache, artifact store, registry,
//! and simulation manager, then parks while the pumps run. The HTTP surface
//! consumes the manager's handles from its own process.

use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gto_core::log();
    let settings = gto_core::Settings::from_env();
    let bus = Arc::new(gto_bus::RedisBus::new(&settings.broker_url, "master")?);
    let cache = Arc::new(gto_bus::RedisCache::new(&settings.cache_url)?);
    let artifacts = Arc::new(gto_orchestrator::FsArtifacts::new(&settings.blob_prefix));
    let registry = Arc::new(gto_registry::Registry::default());
    let orchestrator = gto_orchestrator::Orchestrator::new(
        settings,
        bus,
        cache,
        artifacts,
        registry,
        Arc::new(gto_cards::Showdown),
    );
    orchestrator.spawn_pumps(Duration::from_secs(15));
    gto_core::until_interrupted().await;
    Ok(())
}
