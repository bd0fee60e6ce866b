//! Error types for configuration operations.

use std::path::PathBuf;

use sluice_core::{BufferError, GraphError};
use thiserror::Error;

/// Errors that can occur while loading, saving or building a pipeline.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create directory
    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        /// Path of the directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// The pipeline failed validation.
    #[error("validation failed: {0}")]
    Validation(#[from] crate::validation::ValidationError),

    /// Buffer properties could not produce a buffer.
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// Blocks could not be wired into a graph.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl ConfigError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Create a create directory error.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::CreateDir {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationError;
    use std::error::Error;

    fn mock_io_err() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::NotFound, "mock")
    }

    #[test]
    fn read_file_carries_path_and_source() {
        let err = ConfigError::read_file("/a/pipeline.toml", mock_io_err());
        let expected = std::path::Path::new("/a/pipeline.toml");
        assert!(matches!(err, ConfigError::ReadFile { ref path, .. } if path == expected));
        let msg = err.to_string();
        assert!(msg.contains("failed to read file"), "got: {msg}");
        assert!(msg.contains("/a/pipeline.toml"), "got: {msg}");
        assert!(err.source().is_some());
    }

    #[test]
    fn write_file_display() {
        let err = ConfigError::write_file("/out.toml", mock_io_err());
        assert!(err.to_string().contains("failed to write file"));
        assert!(err.source().is_some());
    }

    #[test]
    fn validation_wraps_message() {
        let err = ConfigError::from(ValidationError::UnknownBlock("fft".to_string()));
        assert_eq!(err.to_string(), "validation failed: unknown block type: fft");
    }

    #[test]
    fn buffer_error_is_transparent() {
        let err = ConfigError::from(BufferError::ZeroCapacity);
        assert_eq!(err.to_string(), BufferError::ZeroCapacity.to_string());
    }
}
