//! The module contains the errors the engine can return.
//!
//! The errors are:
//!
//! - [`KeyNotFound`] thrown when an item is not found, or is not visible to
//!   the caller (ownership checks never leak existence).
//! - [`ExistingKey`] thrown when a unique item already exists.
//! - the `Invalid*` family, thrown by request validation.
//! - [`Database`] wrapping storage failures.
//!
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`ExistingKey`]: EngineError::ExistingKey
//!  [`Database`]: EngineError::Database
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid operation type: {0}")]
    InvalidOperation(String),
    #[error("Invalid category: {0}")]
    InvalidCategory(String),
    #[error("Invalid scope: {0}")]
    InvalidScope(String),
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("Invalid role: {0}")]
    InvalidRole(String),
    #[error("Invalid participants: {0}")]
    InvalidParticipants(String),
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),
    #[error("Invalid name: {0}")]
    InvalidName(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Returns `true` for errors caused by the caller's input (as opposed to
    /// storage failures).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount(_)
                | Self::InvalidOperation(_)
                | Self::InvalidCategory(_)
                | Self::InvalidScope(_)
                | Self::InvalidCursor(_)
                | Self::InvalidRole(_)
                | Self::InvalidParticipants(_)
                | Self::InvalidPeriod(_)
                | Self::InvalidName(_)
        )
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidOperation(a), Self::InvalidOperation(b)) => a == b,
            (Self::InvalidCategory(a), Self::InvalidCategory(b)) => a == b,
            (Self::InvalidScope(a), Self::InvalidScope(b)) => a == b,
            (Self::InvalidCursor(a), Self::InvalidCursor(b)) => a == b,
            (Self::InvalidRole(a), Self::InvalidRole(b)) => a == b,
            (Self::InvalidParticipants(a), Self::InvalidParticipants(b)) => a == b,
            (Self::InvalidPeriod(a), Self::InvalidPeriod(b)) => a == b,
            (Self::InvalidName(a), Self::InvalidName(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
