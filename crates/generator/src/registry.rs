//! Registry of in-flight batches.
//!
//! Tracks the current payload of every non-terminal batch plus a
//! snapshot of its metadata as generated at creation time. Updates must
//! re-read that snapshot so batch metadata stays stable across the
//! lifecycle; it only leaves the map on eviction.

use std::collections::HashMap;
use std::sync::RwLock;

use rand::Rng;

use batchpipe_core::Metadata;
use batchpipe_events::BatchPayload;

/// Shared registry of active (non-terminal) batches.
#[derive(Debug, Default)]
pub struct ActiveRegistry {
    objects: RwLock<HashMap<String, BatchPayload>>,
    original_metadata: RwLock<HashMap<String, Metadata>>,
}

impl ActiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly created batch together with its creation-time
    /// metadata snapshot.
    pub fn register(&self, payload: BatchPayload, metadata_snapshot: Metadata) {
        let id = payload.object_id.clone();
        self.objects.write().unwrap().insert(id.clone(), payload);
        self.original_metadata
            .write()
            .unwrap()
            .insert(id, metadata_snapshot);
    }

    /// Replace the tracked payload for an already registered batch.
    pub fn replace(&self, payload: BatchPayload) {
        self.objects
            .write()
            .unwrap()
            .insert(payload.object_id.clone(), payload);
    }

    pub fn get(&self, object_id: &str) -> Option<BatchPayload> {
        self.objects.read().unwrap().get(object_id).cloned()
    }

    /// Creation-time metadata snapshot for a batch.
    pub fn original_metadata(&self, object_id: &str) -> Option<Metadata> {
        self.original_metadata
            .read()
            .unwrap()
            .get(object_id)
            .cloned()
    }

    /// Pick a uniformly random active batch id, if any.
    pub fn random_id(&self, rng: &mut impl Rng) -> Option<String> {
        let objects = self.objects.read().unwrap();
        if objects.is_empty() {
            return None;
        }
        let index = rng.random_range(0..objects.len());
        objects.keys().nth(index).cloned()
    }

    /// Drop a batch and its metadata snapshot. Returns whether the batch
    /// was tracked.
    pub fn evict(&self, object_id: &str) -> bool {
        let removed = self.objects.write().unwrap().remove(object_id).is_some();
        self.original_metadata.write().unwrap().remove(object_id);
        removed
    }

    pub fn len(&self) -> usize {
        self.objects.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().unwrap().is_empty()
    }
}
