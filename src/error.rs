//! Error types for the onboarding portal.

use crate::onboarding::state::TransitionError;

/// Top-level error type for portal operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
}

impl Error {
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

impl From<TransitionError> for Error {
    fn from(e: TransitionError) -> Self {
        Self::Validation(ValidationError::Transition(e))
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Blob storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outbound notification delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Delivery via {transport} failed: {reason}")]
    DeliveryFailed { transport: String, reason: String },
}

/// Input rejected before any mutation took place.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{0}")]
    Transition(TransitionError),

    #[error("Field {field} is required")]
    MissingField { field: String },

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Unknown specialty: {0}")]
    UnknownSpecialty(String),

    #[error("Unknown step: {0}")]
    UnknownStep(String),

    #[error("Hourly rate must not be negative")]
    NegativeRate,

    #[error("Uploaded file is empty")]
    EmptyUpload,

    #[error("File {path} does not belong to this coach")]
    ForeignFile { path: String },
}

/// Result type alias for the portal.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_errors_are_validation_errors() {
        let err: Error = TransitionError::EmptyFeedback.into();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = Error::not_found("coach", "abc123");
        assert_eq!(err.to_string(), "coach not found: abc123");
    }
}
