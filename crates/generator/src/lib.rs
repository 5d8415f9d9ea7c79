//! `batchpipe-generator` — the producer side of the pipeline.
//!
//! Owns the active-object registry and the original-metadata cache,
//! synthesizes batch data, and emits batch + item lifecycle events over
//! an injected event bus on independently scheduled create/update ticks.

pub mod directory;
pub mod generator;
pub mod items;
pub mod registry;
pub mod scheduler;
pub mod synth;

pub use generator::{BatchEventGenerator, GeneratorConfig, GeneratorStats};
pub use registry::ActiveRegistry;
pub use scheduler::GeneratorHandle;
