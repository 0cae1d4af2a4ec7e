//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository and store calls into use-case level APIs.
//! - Keep CLI/UI layers decoupled from storage details.

pub mod catalog_service;
pub mod progress_service;
pub mod reorder_service;
