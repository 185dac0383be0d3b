//! Error types for tablerag.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Decode error: no candidate encoding could decode the source (tried {})", .attempted.join(", "))]
    Decode { attempted: Vec<String> },

    #[error("Read error: {0}")]
    Read(String),

    #[error("Build error{}: {source}", fmt_row(.row))]
    Build {
        row: Option<usize>,
        #[source]
        source: Box<Error>,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Consistency error: {0}")]
    Consistency(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap a failure that happened while populating the stores.
    ///
    /// Already-wrapped build errors are passed through so row context is
    /// never nested twice.
    pub fn build_at(row: Option<usize>, source: Error) -> Self {
        match source {
            e @ Error::Build { .. } => e,
            other => Error::Build {
                row,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, looking through build wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Build { source, .. } => source.root(),
            other => other,
        }
    }
}

fn fmt_row(row: &Option<usize>) -> String {
    match row {
        Some(r) => format!(" at row {}", r),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
