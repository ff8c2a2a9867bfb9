//! Error types for the turn driver binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup.

use crate::forest_file::ForestFileError;

/// Top-level error for the turn driver binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: saga_core::config::ConfigError,
    },

    /// The forest file could not be loaded.
    #[error("forest error: {source}")]
    Forest {
        /// The underlying loader error.
        #[from]
        source: ForestFileError,
    },

    /// Logging could not be initialized.
    #[error("logging error: {message}")]
    Logging {
        /// Description of the failure.
        message: String,
    },
}
