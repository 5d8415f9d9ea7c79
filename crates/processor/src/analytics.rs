//! Buffered analytics sink.
//!
//! Projects terminal item events into flat completion rows and writes
//! them in batches: a size-triggered flush at `batch_size` rows plus a
//! periodic background flush, with one final synchronous flush on
//! close. Everything else on the stream is counted and dropped. The
//! projection is defensive: malformed metadata degrades to fallback
//! values, it never fails the event.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use batchpipe_core::metadata::keys;
use batchpipe_events::BatchEvent;

use crate::sink::{EventSink, SinkError};

/// One item-completion row.
///
/// `audit_id` is the item's object id; `event_id` is fresh per row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsEvent {
    pub event_id: Uuid,
    pub audit_id: String,
    pub batch_id: String,
    pub company_id: String,
    pub company_name: String,
    pub industry: String,
    pub region: String,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub outcome: String,
    pub completed_at: DateTime<Utc>,
    pub processing_time_ms: i64,
}

/// Project an event into its completion row.
///
/// Only item events with a terminal status qualify; everything else
/// returns `None`.
pub fn project(event: &BatchEvent) -> Option<MetricsEvent> {
    let payload = &event.payload;
    if !payload.object_type.is_item() || !payload.status.is_terminal() {
        return None;
    }

    let metadata = &payload.metadata;
    let company_name = extract_company_name(payload);
    let company_id = metadata
        .get(keys::COMPANY_ID)
        .filter(|id| !id.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| normalize_company_id(&company_name));
    let batch_id = metadata
        .get(keys::BATCH_ID)
        .cloned()
        .unwrap_or_else(|| payload.parent_id().to_string());

    Some(MetricsEvent {
        event_id: Uuid::new_v4(),
        audit_id: payload.object_id.clone(),
        batch_id,
        company_id,
        company_name,
        industry: metadata
            .get(keys::INDUSTRY)
            .cloned()
            .unwrap_or_else(|| "business".to_string()),
        region: metadata.get(keys::REGION).cloned().unwrap_or_default(),
        amount: parse_amount(&payload.object_id, metadata.get(keys::AMOUNT)),
        currency: metadata
            .get(keys::CURRENCY)
            .cloned()
            .unwrap_or_else(|| "USD".to_string()),
        status: payload.status.to_string(),
        outcome: payload.outcome.to_string(),
        completed_at: event.timestamp,
        processing_time_ms: (payload.updated - payload.created).num_milliseconds(),
    })
}

/// Best company name available: summary, then the explicit company
/// keys, then a placeholder built from the company id.
fn extract_company_name(payload: &batchpipe_events::BatchPayload) -> String {
    let metadata = &payload.metadata;
    for key in [keys::SUMMARY, keys::COMPANY, keys::COMPANY_NAME] {
        if let Some(name) = metadata.get(key) {
            if !name.trim().is_empty() {
                return name.clone();
            }
        }
    }
    if let Some(id) = metadata.get(keys::COMPANY_ID) {
        if !id.trim().is_empty() {
            return format!("Company {id}");
        }
    }
    "Unknown Company".to_string()
}

/// Grouping key derived from the company name: lowercase alphanumerics
/// only. An empty result becomes "UNKNOWN".
fn normalize_company_id(company_name: &str) -> String {
    let id: String = company_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if id.is_empty() { "UNKNOWN".to_string() } else { id }
}

/// Parse an amount, stripping currency symbols and separators first.
/// Unparseable values degrade to zero with a warning.
fn parse_amount(object_id: &str, raw: Option<&String>) -> f64 {
    let Some(raw) = raw else {
        return 0.0;
    };
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    match cleaned.parse() {
        Ok(amount) => amount,
        Err(_) => {
            warn!(%object_id, raw = %raw, "unparseable amount, recording zero");
            0.0
        }
    }
}

/// Buffering and flush tunables.
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub stats_interval: Duration,
    pub close_timeout: Duration,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            flush_interval: Duration::from_secs(5),
            stats_interval: Duration::from_secs(30),
            close_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    written: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time sink counters.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsStats {
    pub received: u64,
    pub written: u64,
    pub errors: u64,
    pub buffered: usize,
}

/// Completion count and amount total for one company.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyTotals {
    pub company_id: String,
    pub company_name: String,
    pub completions: u64,
    pub total_amount: f64,
}

/// Storage behind the analytics sink.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// One-time schema bootstrap.
    async fn init(&self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn write_batch(&self, rows: Vec<MetricsEvent>) -> Result<(), SinkError>;

    /// Written completions grouped by company, ordered by company id.
    async fn company_totals(&self) -> Result<Vec<CompanyTotals>, SinkError>;
}

/// The buffered analytics sink.
pub struct AnalyticsBufferSink<S> {
    store: Arc<S>,
    config: AnalyticsConfig,
    buffer: Arc<Mutex<Vec<MetricsEvent>>>,
    counters: Arc<Counters>,
    last_flush: Arc<Mutex<Instant>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    // Size-triggered writes run detached; close() must await them so
    // rows already handed to a write task survive a clean shutdown.
    writes: Mutex<Vec<JoinHandle<()>>>,
}

impl<S: MetricsStore + 'static> AnalyticsBufferSink<S> {
    pub fn new(store: S, config: AnalyticsConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            counters: Arc::new(Counters::default()),
            last_flush: Arc::new(Mutex::new(Instant::now())),
            tasks: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stats(&self) -> AnalyticsStats {
        AnalyticsStats {
            received: self.counters.received.load(Ordering::Relaxed),
            written: self.counters.written.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
            buffered: self.buffer.lock().unwrap().len(),
        }
    }

    fn drain_buffer(&self) -> Vec<MetricsEvent> {
        let mut buffer = self.buffer.lock().unwrap();
        if !buffer.is_empty() {
            *self.last_flush.lock().unwrap() = Instant::now();
        }
        std::mem::take(&mut *buffer)
    }

    /// Flush whatever is buffered and wait for the write.
    pub async fn flush(&self) -> Result<(), SinkError> {
        let batch = self.drain_buffer();
        if batch.is_empty() {
            return Ok(());
        }
        write_out(self.store.as_ref(), &self.counters, batch).await
    }
}

/// Snapshot-and-clear the buffer for the timer task, but only once the
/// flush interval has elapsed since the last flush of any kind.
fn take_if_due(
    buffer: &Mutex<Vec<MetricsEvent>>,
    last_flush: &Mutex<Instant>,
    interval: Duration,
) -> Option<Vec<MetricsEvent>> {
    let mut buffer = buffer.lock().unwrap();
    if buffer.is_empty() {
        return None;
    }
    let mut last = last_flush.lock().unwrap();
    if last.elapsed() < interval {
        return None;
    }
    *last = Instant::now();
    Some(std::mem::take(&mut *buffer))
}

#[async_trait]
impl<S: MetricsStore + 'static> EventSink for AnalyticsBufferSink<S> {
    fn name(&self) -> &'static str {
        "analytics"
    }

    async fn open(&self) -> Result<(), SinkError> {
        self.store.init().await?;

        let mut tasks = self.tasks.lock().unwrap();

        let store = Arc::clone(&self.store);
        let counters = Arc::clone(&self.counters);
        let buffer = Arc::clone(&self.buffer);
        let last_flush = Arc::clone(&self.last_flush);
        let flush_interval = self.config.flush_interval;
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(flush_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(batch) = take_if_due(&buffer, &last_flush, flush_interval) else {
                    continue;
                };
                if let Err(err) = write_out(store.as_ref(), &counters, batch).await {
                    error!(error = %err, "periodic analytics flush failed");
                }
            }
        }));

        let counters = Arc::clone(&self.counters);
        let buffer = Arc::clone(&self.buffer);
        let stats_interval = self.config.stats_interval;
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(stats_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                info!(
                    received = counters.received.load(Ordering::Relaxed),
                    written = counters.written.load(Ordering::Relaxed),
                    errors = counters.errors.load(Ordering::Relaxed),
                    buffered = buffer.lock().unwrap().len(),
                    "analytics sink stats"
                );
            }
        }));

        Ok(())
    }

    async fn handle(&self, event: &BatchEvent) -> Result<(), SinkError> {
        self.counters.received.fetch_add(1, Ordering::Relaxed);
        let Some(row) = project(event) else {
            return Ok(());
        };

        let batch = {
            let mut buffer = self.buffer.lock().unwrap();
            buffer.push(row);
            if buffer.len() >= self.config.batch_size {
                std::mem::take(&mut *buffer)
            } else {
                return Ok(());
            }
        };

        // Write outside the buffer lock so intake never blocks on the
        // store.
        *self.last_flush.lock().unwrap() = Instant::now();
        let store = Arc::clone(&self.store);
        let counters = Arc::clone(&self.counters);
        let write = tokio::spawn(async move {
            if let Err(err) = write_out(store.as_ref(), &counters, batch).await {
                error!(error = %err, "size-triggered analytics flush failed");
            }
        });
        let mut writes = self.writes.lock().unwrap();
        writes.retain(|w| !w.is_finished());
        writes.push(write);
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }

        let writes: Vec<JoinHandle<()>> = self.writes.lock().unwrap().drain(..).collect();
        let drain = async {
            for write in writes {
                let _ = write.await;
            }
            self.flush().await
        };
        let result = match tokio::time::timeout(self.config.close_timeout, drain).await {
            Ok(result) => result,
            Err(_) => Err(SinkError::write("final flush timed out")),
        };

        let stats = self.stats();
        info!(
            received = stats.received,
            written = stats.written,
            errors = stats.errors,
            "analytics sink closed"
        );
        result
    }
}

async fn write_out<S: MetricsStore>(
    store: &S,
    counters: &Counters,
    batch: Vec<MetricsEvent>,
) -> Result<(), SinkError> {
    let count = batch.len() as u64;
    match store.write_batch(batch).await {
        Ok(()) => {
            counters.written.fetch_add(count, Ordering::Relaxed);
            Ok(())
        }
        Err(err) => {
            counters.errors.fetch_add(1, Ordering::Relaxed);
            Err(err)
        }
    }
}

pub use in_memory::InMemoryMetricsStore;

mod in_memory {
    use super::*;

    /// In-memory metrics storage for tests and the demo pipeline.
    #[derive(Debug, Default)]
    pub struct InMemoryMetricsStore {
        rows: Mutex<Vec<MetricsEvent>>,
    }

    impl InMemoryMetricsStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn rows(&self) -> Vec<MetricsEvent> {
            self.rows.lock().unwrap().clone()
        }

        pub fn row_count(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl MetricsStore for InMemoryMetricsStore {
        async fn write_batch(&self, rows: Vec<MetricsEvent>) -> Result<(), SinkError> {
            self.rows.lock().unwrap().extend(rows);
            Ok(())
        }

        async fn company_totals(&self) -> Result<Vec<CompanyTotals>, SinkError> {
            let rows = self.rows.lock().unwrap();
            let mut totals: std::collections::BTreeMap<String, CompanyTotals> =
                std::collections::BTreeMap::new();
            for row in rows.iter() {
                let entry = totals
                    .entry(row.company_id.clone())
                    .or_insert_with(|| CompanyTotals {
                        company_id: row.company_id.clone(),
                        company_name: row.company_name.clone(),
                        completions: 0,
                        total_amount: 0.0,
                    });
                entry.completions += 1;
                entry.total_amount += row.amount;
            }
            Ok(totals.into_values().collect())
        }
    }
}

pub use postgres::PostgresMetricsStore;

mod postgres {
    use sqlx::{PgPool, Row};

    use super::*;

    /// Postgres-backed metrics storage.
    ///
    /// One row per terminal item in a flat table the analytics
    /// dashboards query directly.
    #[derive(Debug, Clone)]
    pub struct PostgresMetricsStore {
        pool: PgPool,
    }

    impl PostgresMetricsStore {
        pub fn new(pool: PgPool) -> Self {
            Self { pool }
        }
    }

    #[async_trait]
    impl MetricsStore for PostgresMetricsStore {
        async fn init(&self) -> Result<(), SinkError> {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS item_completions (
                    event_id UUID PRIMARY KEY,
                    audit_id TEXT NOT NULL,
                    batch_id TEXT NOT NULL,
                    company_id TEXT NOT NULL,
                    company_name TEXT NOT NULL,
                    industry TEXT NOT NULL,
                    region TEXT NOT NULL,
                    amount DOUBLE PRECISION NOT NULL,
                    currency TEXT NOT NULL,
                    status TEXT NOT NULL,
                    outcome TEXT NOT NULL,
                    completed_at TIMESTAMPTZ NOT NULL,
                    processing_time_ms BIGINT NOT NULL
                )
                "#,
            )
            .execute(&self.pool)
            .await?;

            sqlx::query(
                "CREATE INDEX IF NOT EXISTS idx_completions_company ON item_completions (company_id, completed_at)",
            )
            .execute(&self.pool)
            .await?;

            Ok(())
        }

        async fn write_batch(&self, rows: Vec<MetricsEvent>) -> Result<(), SinkError> {
            let mut tx = self.pool.begin().await?;
            for row in &rows {
                sqlx::query(
                    r#"
                    INSERT INTO item_completions (
                        event_id, audit_id, batch_id, company_id, company_name,
                        industry, region, amount, currency, status, outcome,
                        completed_at, processing_time_ms
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                    "#,
                )
                .bind(row.event_id)
                .bind(&row.audit_id)
                .bind(&row.batch_id)
                .bind(&row.company_id)
                .bind(&row.company_name)
                .bind(&row.industry)
                .bind(&row.region)
                .bind(row.amount)
                .bind(&row.currency)
                .bind(&row.status)
                .bind(&row.outcome)
                .bind(row.completed_at)
                .bind(row.processing_time_ms)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            Ok(())
        }

        async fn company_totals(&self) -> Result<Vec<CompanyTotals>, SinkError> {
            let rows = sqlx::query(
                r#"
                SELECT company_id,
                       MAX(company_name) AS company_name,
                       COUNT(*) AS completions,
                       SUM(amount) AS total_amount
                FROM item_completions
                GROUP BY company_id
                ORDER BY company_id
                "#,
            )
            .fetch_all(&self.pool)
            .await?;

            rows.iter()
                .map(|row| {
                    let completions: i64 = row.try_get("completions")?;
                    Ok(CompanyTotals {
                        company_id: row.try_get("company_id")?,
                        company_name: row.try_get("company_name")?,
                        completions: completions as u64,
                        total_amount: row.try_get("total_amount")?,
                    })
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use batchpipe_core::{BatchStatus, Metadata};
    use batchpipe_events::{BatchEvent, BatchPayload, EventType, ObjectType};

    fn item_event(metadata: Metadata, status: BatchStatus) -> BatchEvent {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let updated = created + chrono::Duration::milliseconds(2500);
        BatchEvent {
            event_type: EventType::ItemUpdated,
            timestamp: updated,
            payload: BatchPayload {
                object_id: "b-1-0001".to_string(),
                object_type: ObjectType::Item,
                status,
                outcome: status.outcome(),
                metadata,
                created,
                updated,
            },
        }
    }

    fn complete_item(metadata: Metadata) -> BatchEvent {
        item_event(metadata, BatchStatus::Complete)
    }

    #[test]
    fn only_terminal_items_qualify() {
        assert!(project(&item_event(Metadata::new(), BatchStatus::Processing)).is_none());
        assert!(project(&item_event(Metadata::new(), BatchStatus::Complete)).is_some());
        assert!(project(&item_event(Metadata::new(), BatchStatus::Invalid)).is_some());

        let mut batch = item_event(Metadata::new(), BatchStatus::Complete);
        batch.payload.object_type = ObjectType::Batch;
        batch.event_type = EventType::ObjectUpdated;
        assert!(project(&batch).is_none());
    }

    #[test]
    fn projection_uses_summary_first() {
        let mut metadata = Metadata::new();
        metadata.insert("summary".to_string(), "Octopus Energy".to_string());
        metadata.insert("company".to_string(), "ignored".to_string());
        metadata.insert("industry".to_string(), "energy".to_string());
        metadata.insert("region".to_string(), "UK".to_string());
        metadata.insert("amount".to_string(), "65.00".to_string());
        metadata.insert("currency".to_string(), "GBP".to_string());
        metadata.insert("parent_id".to_string(), "b-1".to_string());

        let row = project(&complete_item(metadata)).unwrap();

        assert_eq!(row.audit_id, "b-1-0001");
        assert_eq!(row.batch_id, "b-1");
        assert_eq!(row.company_name, "Octopus Energy");
        assert_eq!(row.company_id, "octopusenergy");
        assert_eq!(row.industry, "energy");
        assert_eq!(row.amount, 65.00);
        assert_eq!(row.currency, "GBP");
        assert_eq!(row.status, "COMPLETE");
        assert_eq!(row.outcome, "SUCCESS");
        assert_eq!(row.processing_time_ms, 2500);
    }

    #[test]
    fn company_name_fallback_chain() {
        let mut metadata = Metadata::new();
        metadata.insert("company_name".to_string(), "Acme Ltd".to_string());
        let row = project(&complete_item(metadata)).unwrap();
        assert_eq!(row.company_name, "Acme Ltd");

        let mut metadata = Metadata::new();
        metadata.insert("company_id".to_string(), "42".to_string());
        let row = project(&complete_item(metadata)).unwrap();
        assert_eq!(row.company_name, "Company 42");
        assert_eq!(row.company_id, "42");

        let row = project(&complete_item(Metadata::new())).unwrap();
        assert_eq!(row.company_name, "Unknown Company");
        assert_eq!(row.company_id, "unknowncompany");
    }

    #[test]
    fn amount_parsing_is_defensive() {
        let mut metadata = Metadata::new();
        metadata.insert("amount".to_string(), "£1,234.56".to_string());
        assert_eq!(project(&complete_item(metadata)).unwrap().amount, 1234.56);

        let mut metadata = Metadata::new();
        metadata.insert("amount".to_string(), "not a number".to_string());
        assert_eq!(project(&complete_item(metadata)).unwrap().amount, 0.0);

        assert_eq!(project(&complete_item(Metadata::new())).unwrap().amount, 0.0);
    }

    #[test]
    fn company_id_normalization() {
        assert_eq!(normalize_company_id("AT&T Inc"), "attinc");
        assert_eq!(
            normalize_company_id("LV= General Insurance"),
            "lvgeneralinsurance"
        );
        assert_eq!(normalize_company_id("&&&"), "UNKNOWN");
    }

    #[test]
    fn explicit_batch_id_wins_over_parent_id() {
        let mut metadata = Metadata::new();
        metadata.insert("parent_id".to_string(), "b-7".to_string());
        metadata.insert("batch_id".to_string(), "override".to_string());

        assert_eq!(project(&complete_item(metadata)).unwrap().batch_id, "override");
    }

    #[tokio::test]
    async fn non_terminal_events_are_counted_but_not_buffered() {
        let sink = AnalyticsBufferSink::new(
            InMemoryMetricsStore::new(),
            AnalyticsConfig::default(),
        );

        sink.handle(&item_event(Metadata::new(), BatchStatus::Processing))
            .await
            .unwrap();

        let stats = sink.stats();
        assert_eq!(stats.received, 1);
        assert_eq!(stats.buffered, 0);
    }

    #[tokio::test]
    async fn buffer_flushes_at_the_batch_size() {
        let config = AnalyticsConfig {
            batch_size: 3,
            ..AnalyticsConfig::default()
        };
        let sink = AnalyticsBufferSink::new(InMemoryMetricsStore::new(), config);

        for _ in 0..2 {
            sink.handle(&complete_item(Metadata::new())).await.unwrap();
        }
        assert_eq!(sink.store().row_count(), 0);
        assert_eq!(sink.stats().buffered, 2);

        sink.handle(&complete_item(Metadata::new())).await.unwrap();

        // The size-triggered write runs on a spawned task.
        for _ in 0..100 {
            if sink.store().row_count() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(sink.store().row_count(), 3);
        assert_eq!(sink.stats().written, 3);
        assert_eq!(sink.stats().buffered, 0);
    }

    #[tokio::test]
    async fn close_flushes_the_remainder() {
        let sink = AnalyticsBufferSink::new(
            InMemoryMetricsStore::new(),
            AnalyticsConfig::default(),
        );

        sink.handle(&complete_item(Metadata::new())).await.unwrap();
        sink.handle(&complete_item(Metadata::new())).await.unwrap();
        assert_eq!(sink.store().row_count(), 0);

        sink.close().await.unwrap();

        assert_eq!(sink.store().row_count(), 2);
        assert_eq!(sink.stats().written, 2);
    }

    #[tokio::test]
    async fn periodic_flush_drains_a_quiet_buffer() {
        let config = AnalyticsConfig {
            flush_interval: Duration::from_millis(20),
            ..AnalyticsConfig::default()
        };
        let sink = AnalyticsBufferSink::new(InMemoryMetricsStore::new(), config);
        sink.open().await.unwrap();

        sink.handle(&complete_item(Metadata::new())).await.unwrap();

        for _ in 0..100 {
            if sink.store().row_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(sink.store().row_count(), 1);

        sink.close().await.unwrap();
    }

    fn company_item(company: &str, amount: &str) -> BatchEvent {
        let mut metadata = Metadata::new();
        metadata.insert("summary".to_string(), company.to_string());
        metadata.insert("amount".to_string(), amount.to_string());
        complete_item(metadata)
    }

    #[tokio::test]
    async fn company_totals_group_written_rows() {
        let store = InMemoryMetricsStore::new();
        let rows = [
            company_item("Acme Ltd", "10.00"),
            company_item("Acme Ltd", "5.50"),
            company_item("Bolt Co", "2.50"),
        ]
        .iter()
        .map(|event| project(event).unwrap())
        .collect();
        store.write_batch(rows).await.unwrap();

        let totals = store.company_totals().await.unwrap();
        assert_eq!(totals.len(), 2);

        assert_eq!(totals[0].company_id, "acmeltd");
        assert_eq!(totals[0].company_name, "Acme Ltd");
        assert_eq!(totals[0].completions, 2);
        assert!((totals[0].total_amount - 15.50).abs() < 1e-9);

        assert_eq!(totals[1].company_id, "boltco");
        assert_eq!(totals[1].completions, 1);
    }

    #[tokio::test]
    async fn close_waits_for_inflight_size_flush() {
        /// Delays every write so the size-triggered task is still
        /// running when close() starts.
        struct SlowStore {
            inner: InMemoryMetricsStore,
        }

        #[async_trait]
        impl MetricsStore for SlowStore {
            async fn write_batch(&self, rows: Vec<MetricsEvent>) -> Result<(), SinkError> {
                tokio::time::sleep(Duration::from_millis(50)).await;
                self.inner.write_batch(rows).await
            }

            async fn company_totals(&self) -> Result<Vec<CompanyTotals>, SinkError> {
                self.inner.company_totals().await
            }
        }

        let config = AnalyticsConfig {
            batch_size: 1,
            ..AnalyticsConfig::default()
        };
        let sink = AnalyticsBufferSink::new(
            SlowStore {
                inner: InMemoryMetricsStore::new(),
            },
            config,
        );

        sink.handle(&complete_item(Metadata::new())).await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(sink.store().inner.row_count(), 1);
        assert_eq!(sink.stats().written, 1);
    }

    #[test]
    fn timer_flush_respects_the_interval() {
        let buffer = Mutex::new(vec![project(&complete_item(Metadata::new())).unwrap()]);
        let interval = Duration::from_secs(5);

        let recent = Mutex::new(Instant::now());
        assert!(take_if_due(&buffer, &recent, interval).is_none());
        assert_eq!(buffer.lock().unwrap().len(), 1);

        let stale = Mutex::new(Instant::now() - Duration::from_secs(10));
        let batch = take_if_due(&buffer, &stale, interval).unwrap();
        assert_eq!(batch.len(), 1);
        assert!(buffer.lock().unwrap().is_empty());
        assert!(stale.lock().unwrap().elapsed() < interval);
    }

    #[tokio::test]
    async fn write_failures_are_counted() {
        struct FailingStore;

        #[async_trait]
        impl MetricsStore for FailingStore {
            async fn write_batch(&self, _rows: Vec<MetricsEvent>) -> Result<(), SinkError> {
                Err(SinkError::write("down"))
            }

            async fn company_totals(&self) -> Result<Vec<CompanyTotals>, SinkError> {
                Ok(Vec::new())
            }
        }

        let sink = AnalyticsBufferSink::new(FailingStore, AnalyticsConfig::default());
        sink.handle(&complete_item(Metadata::new())).await.unwrap();

        assert!(sink.close().await.is_err());
        assert_eq!(sink.stats().errors, 1);
        assert_eq!(sink.stats().written, 0);
    }
}
