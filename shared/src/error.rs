//! Errors raised while decoding documents or evaluating the domain models

use thiserror::Error;

/// Model-level error types
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Malformed date: '{0}'")]
    MalformedDate(String),

    #[error("Invalid {record} document '{id}': {source}")]
    Decode {
        record: &'static str,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Document is not a JSON object")]
    NotAnObject,

    #[error("Validation error: {0}")]
    Validation(&'static str),
}
