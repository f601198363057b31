//! Pure status computation
//!
//! Everything here is I/O free: the composite status rules and the
//! per-pass status collection the processing engine queries.

pub mod composite;
pub mod status_collection;

pub use composite::{CompositeStatus, StatusEntry, composite};
pub use status_collection::{DEFAULT_BATCH_SIZE, StatusCollection};
