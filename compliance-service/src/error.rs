use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ComplianceError {
    #[error("Certificate not found: {0}")]
    CertificateNotFound(String),

    #[error("Checkpoint not found: {0}")]
    CheckpointNotFound(String),

    #[error("Checkpoint already cleared: {0}")]
    AlreadyCleared(String),

    #[error("Invalid certificate payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid checkpoint input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, ComplianceError>;
