//! Error handling for the Inventory Alerting Engine
//!
//! Every failure is caught at the rule-body boundary and logged with its code;
//! nothing here is surfaced to an operator directly.

use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Document errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid {collection} document '{id}': {message}")]
    InvalidDocument {
        collection: String,
        id: String,
        message: String,
    },

    #[error("Malformed expiration date '{value}' on lot {lot_id}")]
    MalformedDate { lot_id: String, value: String },

    #[error("Model error: {0}")]
    Model(#[from] shared::ModelError),

    // Change feed errors
    #[error("Subscription error: {0}")]
    Subscription(String),

    // Cascade errors
    #[error("Cascade for return {return_id} gave up after {attempts} attempts: {last_error}")]
    CascadeExhausted {
        return_id: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable code used in structured log fields
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidDocument { .. } => "INVALID_DOCUMENT",
            AppError::MalformedDate { .. } => "MALFORMED_DATE",
            AppError::Model(_) => "MODEL_ERROR",
            AppError::Subscription(_) => "SUBSCRIPTION_ERROR",
            AppError::CascadeExhausted { .. } => "CASCADE_EXHAUSTED",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::StorageError(_) => "STORAGE_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::MigrationError(_) => "MIGRATION_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn invalid_document(
        collection: shared::Collection,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        AppError::InvalidDocument {
            collection: collection.as_str().to_string(),
            id: id.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for store and rule operations
pub type AppResult<T> = Result<T, AppError>;
