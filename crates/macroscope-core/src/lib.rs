//! Macroscope Core
//!
//! Core types and interfaces for the Macroscope macro exploration engine.

pub mod config;
pub mod error;
pub mod region;
pub mod types;

pub use error::{Error, Result};
pub use region::{Location, SourceRegion};
pub use types::*;
