use thiserror::Error;

/// Errors produced by the waitlist components
///
/// Only `Configuration`, `NotInitialized`, `InitializationFailed` and `Closed`
/// cross the `WaitlistService` API as `Err`. Every other variant is reported
/// through an `operationFailed` event and a `false`/empty return value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WaitlistError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid address '{address}': {reason}")]
    Validation { address: String, reason: String },

    #[error("Address '{0}' is already on the waitlist")]
    Duplicate(String),

    #[error("Waitlist is not initialized")]
    NotInitialized,

    #[error("Waitlist initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Waitlist is closed")]
    Closed,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Template not found at '{path}': {message}")]
    TemplateNotFound { path: String, message: String },
}

pub type WaitlistResult<T> = Result<T, WaitlistError>;

impl From<mongodb::error::Error> for WaitlistError {
    fn from(err: mongodb::error::Error) -> Self {
        WaitlistError::Persistence(err.to_string())
    }
}

impl From<sea_orm::DbErr> for WaitlistError {
    fn from(err: sea_orm::DbErr) -> Self {
        WaitlistError::Persistence(err.to_string())
    }
}

impl From<database::DatabaseError> for WaitlistError {
    fn from(err: database::DatabaseError) -> Self {
        WaitlistError::Persistence(err.to_string())
    }
}

impl From<core_config::ConfigError> for WaitlistError {
    fn from(err: core_config::ConfigError) -> Self {
        WaitlistError::Configuration(err.to_string())
    }
}
