//! Domain errors

use thiserror::Error;

/// Domain result type
pub type Result<T> = std::result::Result<T, DomainError>;

#[derive(Error, Debug, Clone)]
pub enum DomainError {
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Entity already exists: {0}")]
    AlreadyExists(String),

    #[error("Webhook correlation error: {0}")]
    Correlation(String),

    #[error("Telephony gateway error: {0}")]
    Gateway(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// True for errors caused by the caller's input rather than a fault in
    /// this system or a collaborator.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DomainError::Validation(_)
                | DomainError::NotFound(_)
                | DomainError::AlreadyExists(_)
                | DomainError::Correlation(_)
                | DomainError::InvalidStateTransition(_)
        )
    }
}
