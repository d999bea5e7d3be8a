//! The core module of the extraction pipeline.
//!
//! This module contains the fundamental components shared across the
//! pipeline:
//! - Error handling
//! - Clustering threshold configuration
//!
//! It also re-exports the commonly used types for convenience.

pub mod config;
pub mod errors;

pub use config::ClusterPolicy;
pub use errors::{ExtractError, ExtractResult};
