pub mod certificate;
pub mod customs;
pub mod error;
pub mod types;

pub use certificate::{canonical_json, CertificateAuthority};
pub use customs::CustomsTracker;
pub use error::{ComplianceError, Result};
pub use types::{
    CertificatePayload, CertificateStatus, CheckpointStatus, CustomsCheckpoint, IssueRequest,
    PhytoCertificate, VerificationOutcome,
};
