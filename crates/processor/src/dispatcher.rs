//! Single-subscription fan-out.
//!
//! The dispatcher owns the one subscription to the event stream and
//! hands each event to every registered sink in order. Sink failures
//! are logged per sink and the event is still considered consumed:
//! delivery to the rest of the pipeline must not stall because one
//! destination is down.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use batchpipe_events::{BatchEvent, Subscription};

use crate::sink::{EventSink, SinkError};

#[derive(Default)]
pub struct Dispatcher {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Open every sink. Any failure aborts startup.
    pub async fn open_all(&self) -> Result<(), SinkError> {
        for sink in &self.sinks {
            sink.open().await?;
            info!(sink = sink.name(), "sink opened");
        }
        Ok(())
    }

    /// Close every sink, logging failures.
    pub async fn close_all(&self) {
        for sink in &self.sinks {
            if let Err(err) = sink.close().await {
                warn!(sink = sink.name(), error = %err, "sink close failed");
            }
        }
    }

    /// Deliver one event to every sink, isolating failures.
    pub async fn dispatch(&self, event: &BatchEvent) {
        debug!(
            event_type = ?event.event_type,
            object_id = %event.payload.object_id,
            "dispatching event"
        );
        for sink in &self.sinks {
            if let Err(err) = sink.handle(event).await {
                error!(
                    sink = sink.name(),
                    object_id = %event.payload.object_id,
                    error = %err,
                    "sink rejected event"
                );
            }
        }
    }

    /// Consume the subscription until the stream ends or shutdown flips
    /// to `true`, then close every sink.
    pub async fn run(
        &self,
        subscription: &mut Subscription<BatchEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(sinks = ?self.sink_names(), "dispatcher running");
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("dispatcher shutting down");
                        break;
                    }
                }
                event = subscription.recv() => {
                    match event {
                        Some(event) => self.dispatch(&event).await,
                        None => {
                            info!("event stream closed");
                            break;
                        }
                    }
                }
            }
        }
        self.close_all().await;
    }
}
