//! Error types for the tagtally post-processing and aggregation engine.
//!
//! Errors are grouped by the component that raises them. Only
//! [`TemplateError`] and [`PipelineError::InvalidInterrogator`] are fatal to a
//! whole request; everything else is recovered per image.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for tagtally operations.
#[derive(Error, Debug)]
pub enum TagtallyError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Output filename template errors
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Per-image pipeline errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Search and replace lists must pair up one to one
    #[error("search/replace lists differ in length ({search} search, {replace} replace)")]
    Mismatch { search: usize, replace: usize },

    /// A user-supplied pattern failed to compile
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Output filename template errors. Always fatal to a batch.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// `[hash:<algo>]` named an algorithm we cannot compute
    #[error("'{algorithm}' is not a supported hash algorithm (available: {available})")]
    UnsupportedHash {
        algorithm: String,
        available: String,
    },

    /// A known placeholder was given more arguments than it takes
    #[error("Placeholder [{placeholder}] does not take the argument '{argument}'")]
    UnexpectedArgument {
        placeholder: String,
        argument: String,
    },

    /// The source file could not be read to compute a hash placeholder
    #[error("Cannot read {path} for hashing: {message}")]
    SourceUnreadable { path: PathBuf, message: String },
}

/// Per-image pipeline errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Input is not a decodable image
    #[error("Unreadable image {path}: {message}")]
    UnreadableImage { path: PathBuf, message: String },

    /// Requested interrogator is not registered
    #[error("'{0}' is not a valid interrogator")]
    InvalidInterrogator(String),

    /// The interrogator failed to produce scores
    #[error("Interrogation failed for {path}: {message}")]
    Interrogation { path: PathBuf, message: String },

    /// Interrogator backend could not be loaded
    #[error("Failed to load interrogator '{name}': {message}")]
    Load { name: String, message: String },

    /// An existing target could not be read
    #[error("Failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    /// Writing the target or sidecar failed
    #[error("Failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

/// Convenience type alias for tagtally results.
pub type Result<T> = std::result::Result<T, TagtallyError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
