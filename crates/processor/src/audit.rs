//! Audit trail sink.
//!
//! Keeps a current-state row per batch and an append-only audit entry
//! per event, grouped by parent batch. Item events for a batch the
//! trail has never seen are dropped with a warning rather than creating
//! orphan entries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use batchpipe_core::{BatchStatus, Metadata, Outcome};
use batchpipe_events::{BatchEvent, BatchPayload};

use crate::sink::{EventSink, SinkError};

/// One append-only audit record.
///
/// `previous_status`/`previous_outcome` are reserved columns: the trail
/// records only the new state today, but the schema already carries the
/// transition shape consumers expect.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub entry_id: Uuid,
    pub parent_id: String,
    pub object_id: String,
    pub object_type: String,
    pub action: String,
    pub status: BatchStatus,
    pub outcome: Outcome,
    pub previous_status: Option<BatchStatus>,
    pub previous_outcome: Option<Outcome>,
    pub metadata: Metadata,
    pub event_time: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

/// Storage behind the audit trail sink.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// One-time schema bootstrap.
    async fn init_schema(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Upsert the current-state row for a batch.
    async fn upsert_batch(&self, payload: &BatchPayload) -> Result<(), SinkError>;

    async fn batch_exists(&self, batch_id: &str) -> Result<bool, SinkError>;

    async fn append_entry(&self, entry: AuditEntry) -> Result<(), SinkError>;

    /// All entries under one batch, items included, newest first.
    async fn entries_for_parent(&self, parent_id: &str) -> Result<Vec<AuditEntry>, SinkError>;
}

/// The audit trail sink. Generic over storage so tests run in memory.
pub struct AuditTrailSink<S> {
    store: S,
}

impl<S: AuditStore> AuditTrailSink<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn build_entry(event: &BatchEvent) -> AuditEntry {
        let payload = &event.payload;
        AuditEntry {
            entry_id: Uuid::new_v4(),
            parent_id: payload.parent_id().to_string(),
            object_id: payload.object_id.clone(),
            object_type: payload.object_type.to_string(),
            action: event.event_type.action().to_string(),
            status: payload.status,
            outcome: payload.outcome,
            previous_status: None,
            previous_outcome: None,
            metadata: payload.metadata.clone(),
            event_time: event.timestamp,
            recorded_at: Utc::now(),
        }
    }
}

#[async_trait]
impl<S: AuditStore> EventSink for AuditTrailSink<S> {
    fn name(&self) -> &'static str {
        "audit-trail"
    }

    async fn open(&self) -> Result<(), SinkError> {
        self.store.init_schema().await
    }

    async fn handle(&self, event: &BatchEvent) -> Result<(), SinkError> {
        let payload = &event.payload;

        if payload.object_type.is_batch() {
            self.store.upsert_batch(payload).await?;
        } else {
            // Items must attach to a known batch; events can arrive for
            // a batch the trail never recorded (e.g. a restart).
            let parent_id = payload.parent_id();
            if !self.store.batch_exists(parent_id).await? {
                warn!(
                    object_id = %payload.object_id,
                    parent_id = %parent_id,
                    "dropping item event for unknown batch"
                );
                return Ok(());
            }
        }

        let entry = Self::build_entry(event);
        debug!(
            parent_id = %entry.parent_id,
            object_id = %entry.object_id,
            action = %entry.action,
            "recording audit entry"
        );
        self.store.append_entry(entry).await
    }
}

pub use in_memory::InMemoryAuditStore;

mod in_memory {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-memory audit storage for tests and the demo pipeline.
    #[derive(Debug, Default)]
    pub struct InMemoryAuditStore {
        batches: Mutex<HashMap<String, BatchPayload>>,
        entries: Mutex<Vec<AuditEntry>>,
    }

    impl InMemoryAuditStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn batch(&self, batch_id: &str) -> Option<BatchPayload> {
            self.batches.lock().unwrap().get(batch_id).cloned()
        }

        pub fn entries_for(&self, object_id: &str) -> Vec<AuditEntry> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.object_id == object_id)
                .cloned()
                .collect()
        }

        pub fn entry_count(&self) -> usize {
            self.entries.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AuditStore for InMemoryAuditStore {
        async fn upsert_batch(&self, payload: &BatchPayload) -> Result<(), SinkError> {
            self.batches
                .lock()
                .unwrap()
                .insert(payload.object_id.clone(), payload.clone());
            Ok(())
        }

        async fn batch_exists(&self, batch_id: &str) -> Result<bool, SinkError> {
            Ok(self.batches.lock().unwrap().contains_key(batch_id))
        }

        async fn append_entry(&self, entry: AuditEntry) -> Result<(), SinkError> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        async fn entries_for_parent(&self, parent_id: &str) -> Result<Vec<AuditEntry>, SinkError> {
            // Entries append in arrival order, so newest first is the
            // reverse walk.
            Ok(self
                .entries
                .lock()
                .unwrap()
                .iter()
                .rev()
                .filter(|e| e.parent_id == parent_id)
                .cloned()
                .collect())
        }
    }
}

pub use postgres::PostgresAuditStore;

mod postgres {
    use sqlx::postgres::PgRow;
    use sqlx::{PgPool, Row};

    use super::*;

    /// Postgres-backed audit storage.
    #[derive(Debug, Clone)]
    pub struct PostgresAuditStore {
        pool: PgPool,
    }

    impl PostgresAuditStore {
        pub fn new(pool: PgPool) -> Self {
            Self { pool }
        }
    }

    fn entry_from_row(row: &PgRow) -> Result<AuditEntry, SinkError> {
        let status: String = row.try_get("status")?;
        let outcome: String = row.try_get("outcome")?;
        let previous_status: Option<String> = row.try_get("previous_status")?;
        let previous_outcome: Option<String> = row.try_get("previous_outcome")?;
        let metadata: serde_json::Value = row.try_get("metadata")?;

        Ok(AuditEntry {
            entry_id: row.try_get("entry_id")?,
            parent_id: row.try_get("parent_id")?,
            object_id: row.try_get("object_id")?,
            object_type: row.try_get("object_type")?,
            action: row.try_get("action")?,
            status: status
                .parse()
                .map_err(|e: batchpipe_core::DomainError| SinkError::serialization(e.to_string()))?,
            outcome: outcome
                .parse()
                .map_err(|e: batchpipe_core::DomainError| SinkError::serialization(e.to_string()))?,
            previous_status: previous_status
                .map(|s| s.parse())
                .transpose()
                .map_err(|e: batchpipe_core::DomainError| SinkError::serialization(e.to_string()))?,
            previous_outcome: previous_outcome
                .map(|s| s.parse())
                .transpose()
                .map_err(|e: batchpipe_core::DomainError| SinkError::serialization(e.to_string()))?,
            metadata: serde_json::from_value(metadata)?,
            event_time: row.try_get("event_time")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }

    #[async_trait]
    impl AuditStore for PostgresAuditStore {
        async fn init_schema(&self) -> Result<(), SinkError> {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS batch_objects (
                    object_id TEXT PRIMARY KEY,
                    object_type TEXT NOT NULL,
                    status TEXT NOT NULL,
                    outcome TEXT NOT NULL,
                    metadata JSONB NOT NULL,
                    created TIMESTAMPTZ NOT NULL,
                    updated TIMESTAMPTZ NOT NULL
                )
                "#,
            )
            .execute(&self.pool)
            .await?;

            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS audit_entries (
                    entry_id UUID PRIMARY KEY,
                    parent_id TEXT NOT NULL,
                    object_id TEXT NOT NULL,
                    object_type TEXT NOT NULL,
                    action TEXT NOT NULL,
                    status TEXT NOT NULL,
                    outcome TEXT NOT NULL,
                    previous_status TEXT,
                    previous_outcome TEXT,
                    metadata JSONB NOT NULL,
                    event_time TIMESTAMPTZ NOT NULL,
                    recorded_at TIMESTAMPTZ NOT NULL
                )
                "#,
            )
            .execute(&self.pool)
            .await?;

            sqlx::query(
                "CREATE INDEX IF NOT EXISTS idx_audit_parent_id ON audit_entries (parent_id, event_time)",
            )
            .execute(&self.pool)
            .await?;

            Ok(())
        }

        async fn upsert_batch(&self, payload: &BatchPayload) -> Result<(), SinkError> {
            let metadata = serde_json::to_value(&payload.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO batch_objects (
                    object_id, object_type, status, outcome, metadata, created, updated
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (object_id)
                DO UPDATE SET
                    status = EXCLUDED.status,
                    outcome = EXCLUDED.outcome,
                    metadata = EXCLUDED.metadata,
                    updated = EXCLUDED.updated
                "#,
            )
            .bind(&payload.object_id)
            .bind(payload.object_type.as_str())
            .bind(payload.status.as_str())
            .bind(payload.outcome.as_str())
            .bind(metadata)
            .bind(payload.created)
            .bind(payload.updated)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn batch_exists(&self, batch_id: &str) -> Result<bool, SinkError> {
            let row: Option<(String,)> =
                sqlx::query_as("SELECT object_id FROM batch_objects WHERE object_id = $1")
                    .bind(batch_id)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row.is_some())
        }

        async fn append_entry(&self, entry: AuditEntry) -> Result<(), SinkError> {
            let metadata = serde_json::to_value(&entry.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO audit_entries (
                    entry_id, parent_id, object_id, object_type, action,
                    status, outcome, previous_status, previous_outcome,
                    metadata, event_time, recorded_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(entry.entry_id)
            .bind(&entry.parent_id)
            .bind(&entry.object_id)
            .bind(&entry.object_type)
            .bind(&entry.action)
            .bind(entry.status.as_str())
            .bind(entry.outcome.as_str())
            .bind(entry.previous_status.map(BatchStatus::as_str))
            .bind(entry.previous_outcome.map(Outcome::as_str))
            .bind(metadata)
            .bind(entry.event_time)
            .bind(entry.recorded_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn entries_for_parent(&self, parent_id: &str) -> Result<Vec<AuditEntry>, SinkError> {
            let rows = sqlx::query(
                r#"
                SELECT entry_id, parent_id, object_id, object_type, action,
                       status, outcome, previous_status, previous_outcome,
                       metadata, event_time, recorded_at
                FROM audit_entries
                WHERE parent_id = $1
                ORDER BY event_time DESC, recorded_at DESC
                "#,
            )
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await?;

            rows.iter().map(entry_from_row).collect()
        }
    }
}
