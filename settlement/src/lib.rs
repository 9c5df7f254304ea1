//! AgriRail Settlement Engine
//!
//! Escrow-based settlement for cross-border agricultural freight.
//! Payments lock into escrow at pickup, priced from route distance and
//! fuel volatility; GPS telemetry drives a Haversine geo-fence check at
//! the destination, and a confirmed delivery releases the escrow exactly
//! once through the double-entry ledger. Customs wait times beyond the
//! grace window shrink the payout; stale holds go to dispute.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, clippy::all)]

pub mod config;
pub mod escrow;
pub mod geofence;
pub mod orchestrator;
pub mod pricing;
pub mod scheduler;
pub mod telemetry;
pub mod types;

mod error;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use escrow::EscrowManager;
pub use orchestrator::{SettlementOrchestrator, SweepReport};
pub use scheduler::SweepScheduler;
pub use telemetry::TelemetryIngestor;
pub use types::{
    DisputeResolution, EscrowStatus, EscrowView, FreightEscrow, GeoFence, GeoPoint, LockRequest,
    PingOutcome, PingRequest, TelemetryRecord,
};
