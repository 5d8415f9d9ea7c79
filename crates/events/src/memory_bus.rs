//! In-memory event bus.
//!
//! Stands in for the external wire transport: unbounded channels, best
//! effort fan-out, at-least-once acceptable.

use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::bus::{EventBus, Subscription};

#[derive(Debug)]
pub enum InMemoryBusError {
    /// Publish failed due to internal lock poisoning.
    Poisoned,
}

/// In-memory pub/sub bus over unbounded channels.
///
/// Dead subscribers are pruned on publish.
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<M>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut subs = self
            .subscribers
            .lock()
            .map_err(|_| InMemoryBusError::Poisoned)?;

        subs.retain(|tx| tx.send(message.clone()).is_ok());

        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::unbounded_channel();

        // If the lock is poisoned the subscription is still returned; it
        // just won't receive messages.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_sees_every_message() {
        let bus = InMemoryEventBus::<u32>::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(1).unwrap();
        bus.publish(2).unwrap();

        assert_eq!(first.try_recv().unwrap(), 1);
        assert_eq!(first.try_recv().unwrap(), 2);
        assert_eq!(second.try_recv().unwrap(), 1);
        assert_eq!(second.try_recv().unwrap(), 2);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = InMemoryEventBus::<u32>::new();
        let first = bus.subscribe();
        let mut second = bus.subscribe();

        drop(first);
        bus.publish(7).unwrap();

        assert_eq!(second.try_recv().unwrap(), 7);
        assert_eq!(bus.subscribers.lock().unwrap().len(), 1);
    }

    #[test]
    fn subscriptions_only_see_later_messages() {
        let bus = InMemoryEventBus::<u32>::new();
        bus.publish(1).unwrap();

        let mut sub = bus.subscribe();
        bus.publish(2).unwrap();

        assert_eq!(sub.try_recv().unwrap(), 2);
        assert!(sub.try_recv().is_err());
    }

    #[tokio::test]
    async fn async_recv_delivers_in_order() {
        let bus = InMemoryEventBus::<u32>::new();
        let mut sub = bus.subscribe();

        bus.publish(10).unwrap();
        bus.publish(20).unwrap();

        assert_eq!(sub.recv().await, Some(10));
        assert_eq!(sub.recv().await, Some(20));
    }
}
