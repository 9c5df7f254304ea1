//! Error types for the settlement engine

use thiserror::Error;

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, Error>;

/// Settlement errors
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid input rejected before any state change
    #[error("Validation error: {0}")]
    Validation(String),

    /// Escrow not found
    #[error("Escrow not found: {0}")]
    EscrowNotFound(String),

    /// No escrow bound to the route
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    /// Ledger error (imbalance propagates as a hard failure)
    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger_core::Error),

    /// Compliance error (certificates, checkpoints)
    #[error("Compliance error: {0}")]
    Compliance(#[from] compliance_service::ComplianceError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
