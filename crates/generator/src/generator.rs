//! Batch lifecycle event generator.
//!
//! Two independent ticks drive the pipeline: the create tick synthesizes
//! a new batch and emits its creation events, the update tick advances a
//! random active batch one lifecycle step and emits update events.
//! Publish failures are logged and counted, never propagated; a broken
//! bus must not take the generator threads down.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use batchpipe_core::metadata::keys;
use batchpipe_core::{BatchStatus, DomainResult, Outcome};
use batchpipe_events::{BatchEvent, BatchPayload, EventBus, EventType, ObjectType};

use crate::items;
use crate::registry::ActiveRegistry;
use crate::synth;

/// Tunables for the generator. Intervals only matter once the generator
/// is spawned on its tick threads.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub creation_enabled: bool,
    pub update_enabled: bool,
    pub creation_interval: Duration,
    pub update_interval: Duration,
    pub batch_size_min: u32,
    pub batch_size_max: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            creation_enabled: true,
            update_enabled: true,
            creation_interval: Duration::from_secs(65),
            update_interval: Duration::from_secs(45),
            batch_size_min: 2,
            batch_size_max: 5,
        }
    }
}

impl GeneratorConfig {
    pub fn with_creation_enabled(mut self, enabled: bool) -> Self {
        self.creation_enabled = enabled;
        self
    }

    pub fn with_update_enabled(mut self, enabled: bool) -> Self {
        self.update_enabled = enabled;
        self
    }

    pub fn with_creation_interval(mut self, interval: Duration) -> Self {
        self.creation_interval = interval;
        self
    }

    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    pub fn with_batch_size(mut self, min: u32, max: u32) -> Self {
        self.batch_size_min = min;
        self.batch_size_max = max;
        self
    }
}

#[derive(Debug, Default)]
struct Counters {
    batches_created: AtomicU64,
    batches_updated: AtomicU64,
    items_emitted: AtomicU64,
    ticks_failed: AtomicU64,
}

/// Point-in-time generator counters.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratorStats {
    pub batches_created: u64,
    pub batches_updated: u64,
    pub items_emitted: u64,
    pub ticks_failed: u64,
    pub active_batches: usize,
}

/// The producer. Owns the active registry; publishes to an injected bus.
pub struct BatchEventGenerator<B: EventBus<BatchEvent>> {
    bus: B,
    registry: Arc<ActiveRegistry>,
    config: GeneratorConfig,
    counters: Counters,
}

impl<B: EventBus<BatchEvent>> BatchEventGenerator<B> {
    pub fn new(bus: B, config: GeneratorConfig) -> Self {
        Self {
            bus,
            registry: Arc::new(ActiveRegistry::new()),
            config,
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ActiveRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> GeneratorStats {
        GeneratorStats {
            batches_created: self.counters.batches_created.load(Ordering::Relaxed),
            batches_updated: self.counters.batches_updated.load(Ordering::Relaxed),
            items_emitted: self.counters.items_emitted.load(Ordering::Relaxed),
            ticks_failed: self.counters.ticks_failed.load(Ordering::Relaxed),
            active_batches: self.registry.len(),
        }
    }

    /// One creation tick: synthesize a batch, register it, emit its
    /// OBJECT_CREATED and ITEM_CREATED events.
    pub fn create_tick(&self) {
        if !self.config.creation_enabled {
            return;
        }
        if let Err(err) = self.try_create() {
            self.counters.ticks_failed.fetch_add(1, Ordering::Relaxed);
            error!(error = %err, "batch creation tick failed");
        }
    }

    fn try_create(&self) -> DomainResult<()> {
        let mut rng = rand::rng();
        let now = Utc::now();
        let object_id = Uuid::new_v4().to_string();
        let metadata = synth::build_metadata(
            &mut rng,
            self.config.batch_size_min,
            self.config.batch_size_max,
        );

        synth::validate_batch_metadata(&object_id, &metadata)?;

        let payload = BatchPayload {
            object_id: object_id.clone(),
            object_type: ObjectType::Batch,
            status: BatchStatus::Received,
            outcome: Outcome::Pending,
            metadata: metadata.clone(),
            created: now,
            updated: now,
        };

        let item_events = items::derive_item_events(&payload, EventType::ItemCreated, now)?;

        self.registry.register(payload.clone(), metadata.clone());

        self.publish(BatchEvent {
            event_type: EventType::ObjectCreated,
            timestamp: now,
            payload,
        });
        let item_count = item_events.len() as u64;
        for event in item_events {
            self.publish(event);
        }

        self.counters.batches_created.fetch_add(1, Ordering::Relaxed);
        self.counters
            .items_emitted
            .fetch_add(item_count, Ordering::Relaxed);

        info!(
            batch_id = %object_id,
            items = item_count,
            amount = %metadata[keys::AMOUNT],
            company = %metadata[keys::SUMMARY],
            "batch created"
        );
        Ok(())
    }

    /// One update tick: advance a random active batch one lifecycle step
    /// and emit its OBJECT_UPDATED and ITEM_UPDATED events.
    pub fn update_tick(&self) {
        if !self.config.update_enabled || self.registry.is_empty() {
            return;
        }
        if let Err(err) = self.try_update() {
            self.counters.ticks_failed.fetch_add(1, Ordering::Relaxed);
            error!(error = %err, "batch update tick failed");
        }
    }

    fn try_update(&self) -> DomainResult<()> {
        let mut rng = rand::rng();

        let Some(object_id) = self.registry.random_id(&mut rng) else {
            return Ok(());
        };
        let Some(existing) = self.registry.get(&object_id) else {
            return Ok(());
        };
        if existing.status.is_terminal() {
            // Terminal batches are evicted on transition; seeing one here
            // means a racing tick got there first.
            self.registry.evict(&object_id);
            return Ok(());
        }

        let now = Utc::now();
        let status = existing.status.next(rng.random_bool(0.5));
        let outcome = status.outcome();

        // Updates always re-read the creation-time snapshot so batch
        // metadata never drifts across the lifecycle.
        let metadata = match self.registry.original_metadata(&object_id) {
            Some(snapshot) => snapshot,
            None => {
                warn!(batch_id = %object_id, "original metadata missing, reusing current");
                existing.metadata.clone()
            }
        };

        let payload = BatchPayload {
            object_id: object_id.clone(),
            object_type: ObjectType::Batch,
            status,
            outcome,
            metadata,
            created: existing.created,
            updated: now,
        };

        let item_events = items::derive_item_events(&payload, EventType::ItemUpdated, now)?;

        if status.is_terminal() {
            self.registry.evict(&object_id);
            info!(batch_id = %object_id, status = %status, outcome = %outcome, "batch finished");
        } else {
            self.registry.replace(payload.clone());
        }

        self.publish(BatchEvent {
            event_type: EventType::ObjectUpdated,
            timestamp: now,
            payload,
        });
        let item_count = item_events.len() as u64;
        for event in item_events {
            self.publish(event);
        }

        self.counters.batches_updated.fetch_add(1, Ordering::Relaxed);
        self.counters
            .items_emitted
            .fetch_add(item_count, Ordering::Relaxed);
        Ok(())
    }

    fn publish(&self, event: BatchEvent) {
        let event_type = event.event_type;
        let object_id = event.payload.object_id.clone();
        if let Err(err) = self.bus.publish(event) {
            error!(?event_type, %object_id, ?err, "event publish failed");
        }
    }
}
