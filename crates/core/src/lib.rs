//! `batchpipe-core` — domain foundation for the batch lifecycle pipeline.
//!
//! This crate contains **pure domain** primitives (no infrastructure
//! concerns): cent-accurate amount allocation, the batch status state
//! machine, and the shared metadata vocabulary.

pub mod amount;
pub mod error;
pub mod metadata;
pub mod status;

pub use error::{DomainError, DomainResult};
pub use metadata::Metadata;
pub use status::{BatchStatus, Outcome};
