//! Deep Research Core - shared data model and infrastructure
//!
//! This crate defines the error taxonomy, configuration, logging and async
//! helpers used by every other crate of the deep research workspace.

pub mod async_utils;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use async_utils::*;
pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tokio;
pub use tracing;
