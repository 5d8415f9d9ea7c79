//! `batchpipe-processor` — the consumer side of the pipeline.
//!
//! One subscription to the event stream, fanned out to independent
//! sinks: the operational work queue, the audit trail, and the buffered
//! analytics writer. A sink failure is logged and isolated; it never
//! stops the stream or the other sinks.

pub mod analytics;
pub mod audit;
pub mod dispatcher;
pub mod sink;
pub mod work_queue;


pub use analytics::{
    AnalyticsBufferSink, AnalyticsConfig, CompanyTotals, InMemoryMetricsStore, MetricsStore,
};
pub use audit::{AuditStore, AuditTrailSink, InMemoryAuditStore};
pub use dispatcher::Dispatcher;
pub use sink::{EventSink, SinkError};
pub use work_queue::{InMemoryWorkQueueStore, WorkQueueSink, WorkQueueStore};
