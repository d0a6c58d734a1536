//! gpustat-core: Core types for the GPU slot statistics engine
//!
//! This crate provides the fundamental types used throughout gpustat:
//! - The normalized slot record model (one row of a scheduler snapshot)
//! - The six-way utilization category enum and its classification rules
//! - Analysis configuration (host exclusions, hosted-capacity hosts,
//!   device mappings, memory tiers)
//! - Error handling

pub mod category;
pub mod config;
pub mod error;
pub mod model;

pub use category::*;
pub use config::*;
pub use error::*;
pub use model::*;
