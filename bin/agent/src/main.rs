//! Compute-node agent process.

use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gto_core::log();
    let settings = gto_core::Settings::from_env();
    let node = gto_registry::NodeSpec::local(settings.worker_concurrency);
    let consumer = node.node_id.to_string();
    let bus = Arc::new(gto_bus::RedisBus::new(&settings.broker_url, &consumer)?);
    let cache = Arc::new(gto_bus::RedisCache::new(&settings.cache_url)?);
    let queues = gto_bus::Queues::from(&settings);
    let config = gto_worker::AgentConfig::new(node, &settings);
    let agent = gto_worker::Agent::new(
        bus,
        cache,
        Arc::new(gto_cards::Showdown),
        queues,
        config,
    );
    tokio::spawn(agent.run());
    gto_core::until_interrupted().await;
    Ok(())
}
