//! Demo pipeline: generator, in-memory bus, and all three sinks backed
//! by in-memory stores, wired together in one process. Runs until
//! Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use batchpipe_events::{BatchEvent, EventBus, InMemoryEventBus};
use batchpipe_generator::{BatchEventGenerator, GeneratorConfig};
use batchpipe_processor::{
    AnalyticsBufferSink, AnalyticsConfig, AuditTrailSink, Dispatcher, InMemoryAuditStore,
    InMemoryMetricsStore, InMemoryWorkQueueStore, WorkQueueSink,
};

fn env_duration_secs(name: &str, default: u64) -> Duration {
    let secs = std::env::var(name)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default);
    Duration::from_secs(secs)
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    batchpipe_observability::init();

    let generator_config = GeneratorConfig::default()
        .with_creation_enabled(env_flag("BATCH_CREATION_ENABLED", true))
        .with_update_enabled(env_flag("BATCH_UPDATE_ENABLED", true))
        .with_creation_interval(env_duration_secs("BATCH_CREATION_INTERVAL_SECS", 65))
        .with_update_interval(env_duration_secs("BATCH_UPDATE_INTERVAL_SECS", 45));

    let bus = Arc::new(InMemoryEventBus::<BatchEvent>::new());
    let mut subscription = bus.subscribe();

    let dispatcher = Dispatcher::new()
        .register(Arc::new(WorkQueueSink::new(InMemoryWorkQueueStore::new())))
        .register(Arc::new(AuditTrailSink::new(InMemoryAuditStore::new())))
        .register(Arc::new(AnalyticsBufferSink::new(
            InMemoryMetricsStore::new(),
            AnalyticsConfig::default(),
        )));
    dispatcher
        .open_all()
        .await
        .map_err(|e| anyhow::anyhow!("sink startup failed: {e}"))?;

    let (generator, generator_handle) =
        BatchEventGenerator::new(Arc::clone(&bus), generator_config).spawn();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = tokio::spawn(async move {
        dispatcher.run(&mut subscription, shutdown_rx).await;
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    generator_handle.shutdown();
    info!(stats = ?generator.stats(), "generator final stats");

    shutdown_tx.send(true)?;
    consumer.await?;

    Ok(())
}
