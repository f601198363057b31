//! Core domain types
//!
//! This module contains the core domain structures used across Rivet services.
//! These types represent the fundamental business entities and are shared between
//! the triggering context (which creates them) and the orchestrator (which
//! processes their statuses).

pub mod pipeline;
pub mod processable;
pub mod status;
