//! Tick scheduling.
//!
//! Each tick kind runs on its own named thread with an independent
//! interval. Shutdown is a message on a channel; the loop wakes either
//! on the interval elapsing or on the shutdown signal, so stopping never
//! waits for a full interval worth of sleep.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use batchpipe_events::{BatchEvent, EventBus};

use crate::generator::BatchEventGenerator;

/// Handle to the running tick threads.
pub struct GeneratorHandle {
    shutdown_txs: Vec<mpsc::Sender<()>>,
    joins: Vec<thread::JoinHandle<()>>,
}

impl GeneratorHandle {
    /// Signal both tick threads and wait for them to exit.
    pub fn shutdown(self) {
        for tx in &self.shutdown_txs {
            // A dead thread has already dropped its receiver.
            let _ = tx.send(());
        }
        for join in self.joins {
            if join.join().is_err() {
                warn!("generator tick thread panicked");
            }
        }
        info!("generator stopped");
    }
}

impl<B> BatchEventGenerator<B>
where
    B: EventBus<BatchEvent> + Send + Sync + 'static,
{
    /// Start the create and update tick threads.
    ///
    /// Returns the shared generator (for stats) and the handle used to
    /// stop it.
    pub fn spawn(self) -> (Arc<Self>, GeneratorHandle) {
        let generator = Arc::new(self);
        let creation_interval = generator.config().creation_interval;
        let update_interval = generator.config().update_interval;

        let mut shutdown_txs = Vec::with_capacity(2);
        let mut joins = Vec::with_capacity(2);

        for (name, interval, tick) in [
            (
                "batch-create",
                creation_interval,
                Self::create_tick as fn(&Self),
            ),
            ("batch-update", update_interval, Self::update_tick as fn(&Self)),
        ] {
            let (tx, rx) = mpsc::channel();
            let generator = Arc::clone(&generator);
            let join = thread::Builder::new()
                .name(name.to_string())
                .spawn(move || tick_loop(generator, interval, rx, tick))
                .expect("spawn generator tick thread");
            shutdown_txs.push(tx);
            joins.push(join);
        }

        info!(
            create_interval_ms = creation_interval.as_millis() as u64,
            update_interval_ms = update_interval.as_millis() as u64,
            "generator started"
        );

        (generator, GeneratorHandle { shutdown_txs, joins })
    }
}

fn tick_loop<B>(
    generator: Arc<BatchEventGenerator<B>>,
    interval: Duration,
    shutdown_rx: mpsc::Receiver<()>,
    tick: fn(&BatchEventGenerator<B>),
) where
    B: EventBus<BatchEvent> + Send + Sync + 'static,
{
    loop {
        match shutdown_rx.recv_timeout(interval) {
            Err(mpsc::RecvTimeoutError::Timeout) => tick(&generator),
            // Shutdown signal, or the handle was dropped.
            _ => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use crate::generator::GeneratorConfig;
    use batchpipe_events::InMemoryEventBus;

    #[test]
    fn spawned_generator_ticks_until_shutdown() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut sub = bus.subscribe();
        let config = GeneratorConfig::default()
            .with_creation_interval(Duration::from_millis(10))
            .with_update_interval(Duration::from_millis(10));

        let (generator, handle) = BatchEventGenerator::new(bus, config).spawn();

        let deadline = Instant::now() + Duration::from_secs(5);
        while generator.stats().batches_created == 0 {
            assert!(Instant::now() < deadline, "no batch created in time");
            thread::sleep(Duration::from_millis(5));
        }

        handle.shutdown();
        assert!(sub.try_recv().is_ok());

        // No further ticks after shutdown.
        let created = generator.stats().batches_created;
        thread::sleep(Duration::from_millis(50));
        assert_eq!(generator.stats().batches_created, created);
    }

    #[test]
    fn shutdown_is_prompt_even_with_long_intervals() {
        let bus = Arc::new(InMemoryEventBus::new());
        let config = GeneratorConfig::default()
            .with_creation_interval(Duration::from_secs(3600))
            .with_update_interval(Duration::from_secs(3600));

        let (_generator, handle) = BatchEventGenerator::new(bus, config).spawn();

        let started = Instant::now();
        handle.shutdown();
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
