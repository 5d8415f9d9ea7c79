//! Operational work queue sink.
//!
//! Mirrors the current state of every batch into a hash-per-object plus
//! a time-ordered index, the shape the operations dashboard polls.
//! Item events are skipped: the queue tracks batches only.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tracing::debug;

use batchpipe_events::BatchEvent;

use crate::sink::{EventSink, SinkError};

/// Field-value pairs stored under one queue object.
pub type ObjectFields = Vec<(&'static str, String)>;

/// Storage behind the work queue sink.
#[async_trait]
pub trait WorkQueueStore: Send + Sync {
    /// Upsert the full field set of one object.
    async fn put_object(&self, object_id: &str, fields: ObjectFields) -> Result<(), SinkError>;

    /// Insert or refresh the object in the time-ordered index.
    async fn touch_index(&self, object_id: &str, score: f64) -> Result<(), SinkError>;

    /// Full field set of one object, `None` if the queue has never seen
    /// it.
    async fn fetch_object(
        &self,
        object_id: &str,
    ) -> Result<Option<HashMap<String, String>>, SinkError>;

    /// Up to `limit` object ids, most recently touched first.
    async fn recent_objects(&self, limit: usize) -> Result<Vec<String>, SinkError>;
}

/// The work queue sink. Generic over storage so tests run in memory.
pub struct WorkQueueSink<S> {
    store: S,
}

impl<S: WorkQueueStore> WorkQueueSink<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<S: WorkQueueStore> EventSink for WorkQueueSink<S> {
    fn name(&self) -> &'static str {
        "work-queue"
    }

    async fn handle(&self, event: &BatchEvent) -> Result<(), SinkError> {
        if !event.payload.object_type.is_batch() {
            debug!(
                object_id = %event.payload.object_id,
                "skipping non-batch object"
            );
            return Ok(());
        }

        let payload = &event.payload;
        let metadata_json = serde_json::to_string(&payload.metadata)?;
        let records = payload
            .metadata
            .get(batchpipe_core::metadata::keys::RECORDS)
            .cloned()
            .unwrap_or_else(|| "0".to_string());

        let fields: ObjectFields = vec![
            ("objectId", payload.object_id.clone()),
            ("objectType", payload.object_type.to_string()),
            ("status", payload.status.to_string()),
            ("outcome", payload.outcome.to_string()),
            ("created", payload.created.to_rfc3339()),
            ("updated", payload.updated.to_rfc3339()),
            ("records", records),
            ("metadata", metadata_json),
        ];

        self.store.put_object(&payload.object_id, fields).await?;

        let score = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        self.store.touch_index(&payload.object_id, score).await?;

        Ok(())
    }
}

pub use in_memory::InMemoryWorkQueueStore;

mod in_memory {
    use std::sync::Mutex;

    use super::*;

    /// In-memory work queue storage for tests and the demo pipeline.
    #[derive(Debug, Default)]
    pub struct InMemoryWorkQueueStore {
        objects: Mutex<HashMap<String, HashMap<String, String>>>,
        index: Mutex<HashMap<String, f64>>,
    }

    impl InMemoryWorkQueueStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn get(&self, object_id: &str) -> Option<HashMap<String, String>> {
            self.objects.lock().unwrap().get(object_id).cloned()
        }

        /// Object ids ordered most-recently-touched first.
        pub fn recent(&self) -> Vec<String> {
            let index = self.index.lock().unwrap();
            let mut entries: Vec<(&String, &f64)> = index.iter().collect();
            entries.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));
            entries.into_iter().map(|(id, _)| id.clone()).collect()
        }

        pub fn len(&self) -> usize {
            self.objects.lock().unwrap().len()
        }

        pub fn is_empty(&self) -> bool {
            self.objects.lock().unwrap().is_empty()
        }
    }

    #[async_trait]
    impl WorkQueueStore for InMemoryWorkQueueStore {
        async fn put_object(
            &self,
            object_id: &str,
            fields: ObjectFields,
        ) -> Result<(), SinkError> {
            self.objects.lock().unwrap().insert(
                object_id.to_string(),
                fields
                    .into_iter()
                    .map(|(field, value)| (field.to_string(), value))
                    .collect(),
            );
            Ok(())
        }

        async fn touch_index(&self, object_id: &str, score: f64) -> Result<(), SinkError> {
            self.index
                .lock()
                .unwrap()
                .insert(object_id.to_string(), score);
            Ok(())
        }

        async fn fetch_object(
            &self,
            object_id: &str,
        ) -> Result<Option<HashMap<String, String>>, SinkError> {
            Ok(self.get(object_id))
        }

        async fn recent_objects(&self, limit: usize) -> Result<Vec<String>, SinkError> {
            let mut ids = self.recent();
            ids.truncate(limit);
            Ok(ids)
        }
    }
}

#[cfg(feature = "redis")]
pub use redis_store::RedisWorkQueueStore;

#[cfg(feature = "redis")]
mod redis_store {
    use super::*;

    const OBJECT_KEY_PREFIX: &str = "queue:object:";
    const INDEX_KEY: &str = "queue:objects";

    /// Redis-backed work queue storage.
    ///
    /// One hash per object under `queue:object:{id}`, plus a sorted set
    /// `queue:objects` scored by last-update epoch seconds.
    pub struct RedisWorkQueueStore {
        client: redis::Client,
    }

    impl RedisWorkQueueStore {
        pub fn connect(url: &str) -> Result<Self, SinkError> {
            let client =
                redis::Client::open(url).map_err(|e| SinkError::connection(e.to_string()))?;
            Ok(Self { client })
        }
    }

    #[async_trait]
    impl WorkQueueStore for RedisWorkQueueStore {
        async fn put_object(
            &self,
            object_id: &str,
            fields: ObjectFields,
        ) -> Result<(), SinkError> {
            let mut conn = self
                .client
                .get_connection()
                .map_err(|e| SinkError::connection(e.to_string()))?;

            let mut cmd = redis::cmd("HSET");
            cmd.arg(format!("{OBJECT_KEY_PREFIX}{object_id}"));
            for (field, value) in fields {
                cmd.arg(field).arg(value);
            }
            cmd.query::<()>(&mut conn)
                .map_err(|e| SinkError::write(e.to_string()))?;
            Ok(())
        }

        async fn touch_index(&self, object_id: &str, score: f64) -> Result<(), SinkError> {
            let mut conn = self
                .client
                .get_connection()
                .map_err(|e| SinkError::connection(e.to_string()))?;

            redis::cmd("ZADD")
                .arg(INDEX_KEY)
                .arg(score)
                .arg(object_id)
                .query::<()>(&mut conn)
                .map_err(|e| SinkError::write(e.to_string()))?;
            Ok(())
        }

        async fn fetch_object(
            &self,
            object_id: &str,
        ) -> Result<Option<HashMap<String, String>>, SinkError> {
            let mut conn = self
                .client
                .get_connection()
                .map_err(|e| SinkError::connection(e.to_string()))?;

            let fields: HashMap<String, String> = redis::cmd("HGETALL")
                .arg(format!("{OBJECT_KEY_PREFIX}{object_id}"))
                .query(&mut conn)
                .map_err(|e| SinkError::write(e.to_string()))?;
            // HGETALL on a missing key yields an empty hash.
            Ok(if fields.is_empty() { None } else { Some(fields) })
        }

        async fn recent_objects(&self, limit: usize) -> Result<Vec<String>, SinkError> {
            if limit == 0 {
                return Ok(Vec::new());
            }
            let mut conn = self
                .client
                .get_connection()
                .map_err(|e| SinkError::connection(e.to_string()))?;

            redis::cmd("ZREVRANGE")
                .arg(INDEX_KEY)
                .arg(0)
                .arg((limit - 1) as isize)
                .query(&mut conn)
                .map_err(|e| SinkError::write(e.to_string()))
        }
    }
}
