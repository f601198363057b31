//! Rivet Core
//!
//! Core types and abstractions for the Rivet CI/CD system.
//!
//! This crate contains:
//! - Domain types: Core business entities (Pipeline, Stage, Processable, Status)
//! - Processing: Pure composite-status computation used by the orchestrator
//! - DTOs: Data transfer objects for inter-service communication

pub mod domain;
pub mod dto;
pub mod processing;
