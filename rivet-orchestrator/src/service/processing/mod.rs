//! Pipeline processing engine
//!
//! `atomic` runs passes, `updater` advances single processables and
//! `transition` decides what they advance to.

pub mod atomic;
pub mod transition;
pub mod updater;

pub use atomic::{AtomicProcessingService, ProcessOutcome, ProcessingError, lease_key};
pub use transition::{TransitionPolicy, WhenPolicy};
pub use updater::{ProcessableUpdater, UpdateOutcome};
