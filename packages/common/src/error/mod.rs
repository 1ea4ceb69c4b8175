//! Error types and logging infrastructure
//!
//! - `types`: artifact validation errors
//! - `logging`: env_logger bootstrap and domain log helpers

pub mod logging;
pub mod types;

pub use logging::LoggingTransformer;
pub use types::{ArtifactError, Result};
