//! Types for freight escrow settlement

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// WGS84 coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lng: f64,
}

impl GeoPoint {
    /// Create a new point
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Coordinate range check
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Circular delivery boundary around a destination
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoFence {
    /// Fence center
    pub center: GeoPoint,
    /// Radius in meters
    pub radius_m: f64,
}

/// Escrow lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowStatus {
    /// Funds held pending delivery proof
    Held,
    /// Released to the driver (terminal)
    Released,
    /// Timed out or anomalous; awaiting admin resolution
    Disputed,
    /// Returned after dispute resolution (terminal)
    Refunded,
}

impl EscrowStatus {
    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, EscrowStatus::Released | EscrowStatus::Refunded)
    }
}

/// Freight payment held in escrow pending geo-fenced delivery proof
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreightEscrow {
    /// Unique escrow ID
    pub escrow_id: Uuid,

    /// Freight route
    pub route_id: String,

    /// Driver delivering the shipment
    pub driver_id: String,

    /// Distance-based price component
    pub base_price: Decimal,

    /// Fuel volatility surcharge
    pub fuel_surcharge: Decimal,

    /// Accumulated customs delay penalties
    pub customs_delay_penalty: Decimal,

    /// base_price + fuel_surcharge
    pub total_freight_amount: Decimal,

    /// Settled amount; computed exactly once, at release
    pub final_amount: Option<Decimal>,

    /// Delivery geo-fence
    pub destination: GeoFence,

    /// Confirmed delivery position
    pub delivery_point: Option<GeoPoint>,

    /// Geo-fence confirmation flag
    pub geo_fence_passed: bool,

    /// SHA-256 over route, position and timestamp at release
    pub delivery_proof_hash: Option<String>,

    /// Lifecycle status
    pub status: EscrowStatus,

    /// Lock timestamp
    pub created_at: DateTime<Utc>,

    /// Release timestamp
    pub released_at: Option<DateTime<Utc>>,

    /// Ledger transaction that locked the funds
    pub hold_transaction_id: Uuid,

    /// Ledger transaction that settled the escrow
    pub release_transaction_id: Option<Uuid>,
}

/// Append-only GPS telemetry record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Freight route
    pub route_id: String,

    /// Reporting vehicle
    pub vehicle_id: String,

    /// Reported position
    pub point: GeoPoint,

    /// Speed in km/h
    pub speed_kmh: f64,

    /// Observed fuel price per liter
    pub fuel_price_per_liter: Decimal,

    /// Report timestamp
    pub recorded_at: DateTime<Utc>,
}

/// Outcome of a telemetry ping against the route's escrow
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PingOutcome {
    /// Position was inside the delivery fence
    pub geo_fence_passed: bool,

    /// This ping won the release
    pub escrow_released: bool,

    /// Settled amount, present on release
    pub final_amount: Option<Decimal>,
}

impl PingOutcome {
    /// Outcome for a ping that changed nothing
    pub fn no_op() -> Self {
        Self {
            geo_fence_passed: false,
            escrow_released: false,
            final_amount: None,
        }
    }
}

/// Admin decision resolving a disputed escrow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeResolution {
    /// Pay the driver the final amount
    Release,
    /// Return the full held amount
    Refund,
}

/// Request to lock a freight escrow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRequest {
    pub route_id: String,
    pub driver_id: String,
    pub dest_lat: f64,
    pub dest_lng: f64,
    pub radius_m: f64,
    pub distance_km: Decimal,
    pub fuel_price: Decimal,
}

/// Inbound GPS ping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingRequest {
    pub route_id: String,
    pub vehicle_id: String,
    pub lat: f64,
    pub lng: f64,
    pub speed_kmh: f64,
    pub fuel_price: Decimal,
}

/// Full escrow view for status queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowView {
    /// The escrow with its geo-fence configuration
    pub escrow: FreightEscrow,

    /// Checkpoints logged for the route
    pub checkpoints: Vec<compliance_service::CustomsCheckpoint>,

    /// Most recent telemetry, if any
    pub latest_telemetry: Option<TelemetryRecord>,
}
