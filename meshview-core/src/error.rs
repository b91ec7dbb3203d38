//! Error types for meshview core

use thiserror::Error;

/// Main error type for scene-side operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Unknown node: {0}")]
    UnknownNode(usize),

    #[error("Unknown material: {0}")]
    UnknownMaterial(usize),

    #[error("Invalid color: {0:?}")]
    InvalidColor(String),

    #[error("Node {child} cannot be attached under {parent}: would create a cycle")]
    Cycle { child: usize, parent: usize },
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;
