//! Error types for the gltf-schema-gen crate.

use std::path::PathBuf;

/// Errors that abort a generator run.
///
/// Most schema problems are not errors: unsupported shapes, unresolvable
/// references and title collisions are logged and degraded around. Only the
/// conditions below stop the run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The root schema (or another schema the caller insists on) could not be
    /// loaded from any search location.
    #[error("schema '{name}' not found (tried: {attempted})")]
    SchemaNotFound { name: String, attempted: String },

    /// The generator configuration file could not be parsed.
    #[error("invalid configuration in {path}: {source}")]
    Config {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Failed to write generated output.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read a file from disk.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON parse or serialization error with no better context.
    #[error("failed to process JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Network error while fetching a remote schema.
    #[cfg(feature = "download")]
    #[error("download failed: {0}")]
    Download(String),
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
