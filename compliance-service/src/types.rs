//! Types for phyto-sanitary certificates and customs checkpoints

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Certificate lifecycle status
///
/// The payload is immutable once issued; only the status may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertificateStatus {
    /// Prepared but not yet signed
    Draft,
    /// Signed and handed to the carrier
    Issued,
    /// Accepted by the destination authority
    Accepted,
    /// Rejected by the destination authority
    Rejected,
    /// Past its validity window
    Expired,
}

/// Signed certificate payload
///
/// Canonicalized to a deterministic JSON string (stable key ordering)
/// before signing, so any byte-level change breaks verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificatePayload {
    /// Unique certificate number
    pub certificate_number: String,

    /// Freight route the shipment travels
    pub route_id: String,

    /// Produce batch covered by the certificate
    pub batch_id: String,

    /// Origin country (ISO 3166-1 alpha-2)
    pub origin_country: String,

    /// Destination country (ISO 3166-1 alpha-2)
    pub destination_country: String,

    /// Commodity description
    pub commodity: String,

    /// Declared quantity in kilograms
    pub declared_quantity_kg: Decimal,

    /// Issue timestamp
    pub issued_at: DateTime<Utc>,

    /// Expiry timestamp
    pub valid_until: DateTime<Utc>,
}

/// Issued phyto-sanitary certificate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhytoCertificate {
    /// Signed payload
    pub payload: CertificatePayload,

    /// SHA-256 over the canonical payload, hex-encoded
    pub signature: String,

    /// Lifecycle status
    pub status: CertificateStatus,
}

/// Request to issue a new certificate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRequest {
    pub route_id: String,
    pub batch_id: String,
    pub origin_country: String,
    pub destination_country: String,
    pub commodity: String,
    pub declared_quantity_kg: Decimal,
}

/// Read-side verification outcome
///
/// Tampered or forged certificates yield `valid: false`; verification is
/// an expected, handleable outcome, never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// Signature recomputation matched the stored signature
    pub valid: bool,

    /// Current lifecycle status
    pub status: CertificateStatus,

    /// Certificate number checked
    pub certificate_number: String,

    /// Stored payload, for border-agent display
    pub payload: Option<CertificatePayload>,
}

/// Checkpoint lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointStatus {
    /// Arrived, awaiting clearance
    Pending,
    /// Cleared through customs
    Cleared,
    /// Refused entry
    Rejected,
    /// Pulled aside for physical inspection
    HeldForInspection,
}

/// Border checkpoint crossing for a freight route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomsCheckpoint {
    /// Unique checkpoint ID
    pub checkpoint_id: Uuid,

    /// Freight route
    pub route_id: String,

    /// Checkpoint name (e.g. "Malaba Border Post")
    pub name: String,

    /// Country of the checkpoint
    pub country: String,

    /// Arrival timestamp
    pub arrived_at: DateTime<Utc>,

    /// Clearance timestamp (None while pending)
    pub cleared_at: Option<DateTime<Utc>>,

    /// Wait duration in hours, computed on clearance
    pub wait_hours: Option<Decimal>,

    /// Lifecycle status
    pub status: CheckpointStatus,

    /// Linked phyto certificate, if the crossing requires one
    pub certificate_number: Option<String>,

    /// Clearance notes from the border agent
    pub notes: Option<String>,
}
