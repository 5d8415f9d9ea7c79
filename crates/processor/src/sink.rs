//! The sink contract.

use async_trait::async_trait;
use thiserror::Error;

use batchpipe_events::BatchEvent;

/// Error surfaced by a sink. The dispatcher logs these and moves on;
/// only `open` failures are fatal to startup.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl SinkError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for SinkError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                Self::Connection(err.to_string())
            }
            other => Self::Write(other.to_string()),
        }
    }
}

/// A destination for lifecycle events.
///
/// Sinks are independent: each receives every event, and a failure in
/// one must not affect the others. `handle` takes a reference because
/// the dispatcher fans the same event out to every sink.
#[async_trait]
pub trait EventSink: Send + Sync {
    fn name(&self) -> &'static str;

    /// One-time startup (schema bootstrap, background tasks). A failure
    /// here aborts pipeline startup.
    async fn open(&self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn handle(&self, event: &BatchEvent) -> Result<(), SinkError>;

    /// Graceful shutdown (final flush). Errors are logged, not fatal.
    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
