//! # Error Types
//!
//! Unified error handling across the simulator crates.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for simulator operations
#[derive(Error, Debug)]
pub enum LifeError {
    /// Kernel source failed to parse or validate; `log` is the compiler report
    #[error("Error in kernel code:\n{log}")]
    Compile { log: String },

    /// No compute device could be found or opened
    #[error("No suitable compute device: {0}")]
    NoDevice(String),

    /// Kernel source file could not be read
    #[error("Kernel source not found: {}", path.display())]
    MissingSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Host or device access to a buffer that lacks that residency
    #[error("Residency error: {0}")]
    Residency(String),

    /// Bad RLE header or body
    #[error("Malformed pattern (line {line}): {message}")]
    MalformedPattern { line: usize, message: String },

    /// Pattern file could not be read
    #[error("Pattern file {}: {source}", path.display())]
    PatternFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Entry point missing from the program (or from the backend)
    #[error("Kernel not found: {0}")]
    KernelNotFound(String),

    /// Kernel argument misuse
    #[error("Invalid kernel argument: {0}")]
    InvalidArgument(String),

    /// Global or local work size the backend cannot dispatch
    #[error("Invalid work size: {0}")]
    InvalidWorkSize(String),

    /// Whole-buffer transfer with a host slice of the wrong length
    #[error("Buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSize { expected: usize, actual: usize },

    /// Device fault during a transfer or dispatch
    #[error("GPU error: {0}")]
    Gpu(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for simulator operations
pub type LifeResult<T> = Result<T, LifeError>;

impl LifeError {
    /// Create a compile error from a diagnostic log
    pub fn compile(log: impl Into<String>) -> Self {
        Self::Compile { log: log.into() }
    }

    /// Create a residency error
    pub fn residency(msg: impl Into<String>) -> Self {
        Self::Residency(msg.into())
    }

    /// Create a malformed-pattern error at a 1-based line
    pub fn malformed(line: usize, msg: impl Into<String>) -> Self {
        Self::MalformedPattern {
            line,
            message: msg.into(),
        }
    }

    /// Create an invalid-argument error
    pub fn argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a GPU error
    pub fn gpu(msg: impl Into<String>) -> Self {
        Self::Gpu(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
