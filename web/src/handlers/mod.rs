//! HTTP request handlers.
//!
//! This module contains all HTTP handlers organized by concern.

pub mod health;
pub mod metrics;
pub mod records;

// Re-export common handler utilities
pub use health::health_check;
