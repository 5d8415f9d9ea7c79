//! Event publishing/subscription abstraction.
//!
//! A lightweight pub/sub contract between the generator and the
//! processor. The bus is for distribution, not storage: delivery is
//! at-least-once and subscribers must be idempotent. Publication is a
//! plain synchronous call so threaded producers can publish without a
//! runtime; consumption is async so the dispatcher can await the next
//! event alongside a shutdown signal.

use std::sync::Arc;

use tokio::sync::mpsc;

/// A subscription to an event stream.
///
/// Each subscription receives a copy of every event published after it
/// was created (broadcast semantics). Designed for single-task
/// consumption.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: mpsc::UnboundedReceiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: mpsc::UnboundedReceiver<M>) -> Self {
        Self { receiver }
    }

    /// Await the next message. `None` means the bus was dropped.
    pub async fn recv(&mut self) -> Option<M> {
        self.receiver.recv().await
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&mut self) -> Result<M, mpsc::error::TryRecvError> {
        self.receiver.try_recv()
    }
}

/// Transport-agnostic event bus (pub/sub).
///
/// Implementations make no persistence guarantees; events are considered
/// delivered to the stream once `publish` returns. Failures after that
/// point are the consumer's concern (at-least-once, per-sink-independent
/// delivery).
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
