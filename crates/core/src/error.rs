//! Error types for file conversion.

use std::path::PathBuf;
use thiserror::Error;

use crate::format::FormatId;

/// Request rejected before any converter runs.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Input file not found.
    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    /// Input path exists but is not a regular file.
    #[error("Input path is not a file: {0}")]
    NotAFile(PathBuf),

    /// Input file exists but cannot be opened for reading.
    #[error("Input file is not readable '{path}': {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input file is larger than the configured ceiling.
    #[error("File size ({size_bytes} bytes) exceeds maximum allowed ({limit_bytes} bytes): {path}")]
    FileTooLarge {
        path: PathBuf,
        size_bytes: u64,
        limit_bytes: u64,
    },

    /// No format could be derived from the file extension.
    #[error("Could not determine format of '{path}' (format undeterminable)")]
    UndeterminableFormat { path: PathBuf },

    /// A declared parameter has the wrong type or is out of range.
    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: String, message: String },
}

/// Failure while planning or executing a conversion.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// No converter chain links the two formats.
    #[error("No conversion path from {input_format} to {output_format}")]
    NoConversionPath {
        input_format: FormatId,
        output_format: FormatId,
    },

    /// A stage of the conversion path failed.
    #[error(
        "Stage {index}/{total} ({converter}: {input_format} -> {output_format}) failed: {source}"
    )]
    Stage {
        index: usize,
        total: usize,
        converter: String,
        input_format: FormatId,
        output_format: FormatId,
        #[source]
        source: Box<ConversionError>,
    },

    /// Generic converter failure.
    #[error("Conversion failed: {0}")]
    Failed(String),

    /// Input could not be parsed in its declared format.
    #[error("Failed to parse {format} data: {message}")]
    Parse { format: FormatId, message: String },

    /// Data cannot be represented in the requested output format.
    #[error("Cannot write {format}: {message}")]
    UnsupportedData { format: FormatId, message: String },

    /// The converter does not handle this format pair.
    #[error("Converter '{converter}' does not support {input_format} -> {output_format}")]
    UnsupportedPair {
        converter: String,
        input_format: FormatId,
        output_format: FormatId,
    },

    /// External binary required by a converter is not installed.
    #[error("External tool '{0}' not found in PATH")]
    ToolNotFound(String),

    /// External binary exited with an error.
    #[error("External tool '{tool}' failed for '{path}': {message}")]
    ToolFailed {
        tool: String,
        path: PathBuf,
        message: String,
    },

    /// A converter reported success but its output file is missing.
    #[error("Converter reported success but no output was written to '{0}'")]
    MissingOutput(PathBuf),

    /// The per-conversion workspace could not be created.
    #[error("Failed to create temporary workspace under '{base}': {source}")]
    Workspace {
        base: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem error inside a converter.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConversionError {
    /// Shorthand for a parse error on `format`.
    pub fn parse(format: &FormatId, err: impl std::fmt::Display) -> Self {
        ConversionError::Parse {
            format: format.clone(),
            message: err.to_string(),
        }
    }

    /// Shorthand for an unsupported-data error on `format`.
    pub fn unsupported(format: &FormatId, message: impl Into<String>) -> Self {
        ConversionError::UnsupportedData {
            format: format.clone(),
            message: message.into(),
        }
    }

    /// The 1-based index of the failing stage, if this is a stage failure.
    pub fn stage_index(&self) -> Option<usize> {
        match self {
            ConversionError::Stage { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// A converter category could not be loaded during discovery.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// A tool the category depends on is unavailable.
    #[error("Category '{category}' unavailable: {tool} not found")]
    ToolUnavailable { category: String, tool: String },

    /// The provider does not know this category.
    #[error("Unknown converter category '{0}'")]
    UnknownCategory(String),

    /// Any other load failure.
    #[error("Failed to load category '{category}': {message}")]
    Failed { category: String, message: String },
}

/// Main error type returned by the engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Request failed pre-flight validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Planning or execution failed.
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// True for errors raised before any converter was invoked.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, Error>;
