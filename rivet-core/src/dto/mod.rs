//! Data Transfer Objects for inter-service communication
//!
//! This module contains DTOs used for communication between Rivet services
//! and API consumers. DTOs are lightweight representations of domain
//! entities optimized for network transfer.

pub mod pipeline;
pub mod processable;
