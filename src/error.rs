//! Index error types.

use thiserror::Error;

/// Errors that can occur during index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Virtual path not present in the index.
    #[error("No such entry: {path}")]
    NotFound {
        /// The virtual path that was not found.
        path: String,
    },

    /// An intermediate component of a virtual path is a mapped file.
    #[error("Not a directory: {path}")]
    NotADirectory {
        /// The virtual path of the offending component.
        path: String,
    },

    /// A file operation was attempted on a directory node.
    #[error("Is a directory: {path}")]
    IsADirectory {
        /// The virtual path of the directory.
        path: String,
    },

    /// A file was mapped onto a directory that still has children.
    #[error("Directory not empty: {path}")]
    DirectoryNotEmpty {
        /// The virtual path of the populated directory.
        path: String,
    },

    /// Write requested while write-through is disabled.
    #[error("Write-through disabled: {path}")]
    WriteDisabled {
        /// The virtual path of the attempted write.
        path: String,
    },

    /// Unrecognized access-mode token.
    #[error("Unknown access mode: {token}")]
    UnknownMode {
        /// The token that failed to parse.
        token: String,
    },

    /// No open handle is tracked for the virtual path.
    #[error("No open handle: {path}")]
    NoHandle {
        /// The virtual path without a handle.
        path: String,
    },

    /// A handle for the virtual path is already outstanding.
    #[error("Handle already open: {path}")]
    HandleInUse {
        /// The virtual path with the live handle.
        path: String,
    },

    /// Write attempted through a handle opened read-only.
    #[error("Handle is read-only: {path}")]
    HandleReadOnly {
        /// Path of the handle that rejected the write.
        path: String,
    },

    /// IO error from the backing filesystem.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path where the error occurred.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl IndexError {
    /// Create an Io variant from std::io::Error.
    ///
    /// # Arguments
    /// * `path` - Path where the error occurred
    /// * `source` - The underlying IO error
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a NotFound variant.
    ///
    /// # Arguments
    /// * `path` - The virtual path that was not found
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }
}
