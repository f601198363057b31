//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services orchestrate between repositories and contain domain logic.

pub mod cache;
pub mod lease;
pub mod pipeline;
pub mod processable;
pub mod processing;
pub mod queue;

// Re-export for convenience
pub use pipeline as pipeline_service;
pub use processable as processable_service;
