//! Error types for model loading

use thiserror::Error;

/// Errors that can occur while fetching or decoding a model
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP status {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Parse error ({format}): {message}")]
    Parse { format: &'static str, message: String },

    #[error("Compressed geometry: {message}")]
    Compressed { message: String },

    #[error("No renderable geometry in {url}")]
    Empty { url: String },

    #[error("Invalid model data: {0}")]
    Invalid(#[from] meshview_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoadError {
    pub(crate) fn parse(format: &'static str, message: impl ToString) -> Self {
        LoadError::Parse {
            format,
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;
