//! Settlement orchestration
//!
//! Wires the ledger, escrow manager, telemetry ingestor, certificate
//! authority and customs tracker into one entry point. The orchestrator
//! owns the cross-component flows: a GPS ping lands in the telemetry log
//! and then drives the geo-fence evaluation; a checkpoint clearance feeds
//! its wait time straight into the escrow's penalty.

use crate::{
    config::Config,
    escrow::EscrowManager,
    pricing,
    telemetry::TelemetryIngestor,
    types::{
        DisputeResolution, EscrowView, FreightEscrow, GeoPoint, LockRequest, PingOutcome,
        PingRequest,
    },
    Error, Result,
};
use chrono::{DateTime, Utc};
use compliance_service::{
    CertificateAuthority, CustomsCheckpoint, CustomsTracker, IssueRequest, PhytoCertificate,
    VerificationOutcome,
};
use ledger_core::LedgerEngine;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// What a background sweep run changed
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Escrows moved to dispute by the timeout sweep
    pub disputed_escrows: Vec<Uuid>,

    /// Routes whose fuel surcharge was repriced
    pub repriced_routes: Vec<String>,

    /// Checkpoints flagged for inspection by the stale sweep
    pub stale_checkpoints: Vec<Uuid>,

    /// Certificates expired past their validity window
    pub expired_certificates: usize,
}

/// Top-level settlement engine
pub struct SettlementOrchestrator {
    config: Config,
    ledger: Arc<LedgerEngine>,
    escrows: Arc<EscrowManager>,
    telemetry: Arc<TelemetryIngestor>,
    certificates: Arc<CertificateAuthority>,
    customs: Arc<CustomsTracker>,
}

impl SettlementOrchestrator {
    /// Build the full engine from configuration
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let mut ledger_config = ledger_core::Config::default();
        ledger_config.data_dir = config.ledger_data_dir.clone();
        let ledger = Arc::new(LedgerEngine::open(ledger_config)?);

        let escrows = Arc::new(EscrowManager::new(
            Arc::clone(&ledger),
            config.escrow_timeout_days,
        ));
        let certificates = Arc::new(CertificateAuthority::new(config.certificate_validity_days));

        Ok(Self {
            config,
            ledger,
            escrows,
            telemetry: Arc::new(TelemetryIngestor::new()),
            certificates,
            customs: Arc::new(CustomsTracker::new()),
        })
    }

    /// Lock a freight payment into escrow
    pub fn lock_escrow(&self, request: LockRequest) -> Result<FreightEscrow> {
        self.escrows.lock(request, Utc::now())
    }

    /// Record a GPS ping and evaluate it against the route's escrow
    ///
    /// The ping is logged even when the route has no escrow or the escrow
    /// is already settled; only the fence evaluation is skipped.
    pub fn ingest_ping(&self, request: PingRequest) -> Result<PingOutcome> {
        let now = Utc::now();
        let record = self.telemetry.ingest(&request, now)?;

        match self
            .escrows
            .evaluate_geo_fence(&record.route_id, record.point, record.recorded_at)
        {
            Ok(outcome) => Ok(outcome),
            Err(Error::RouteNotFound(_)) => {
                tracing::debug!(route_id = %record.route_id, "Ping for route without escrow");
                Ok(PingOutcome::no_op())
            }
            Err(e) => Err(e),
        }
    }

    /// Record arrival at a border checkpoint
    pub fn log_arrival(
        &self,
        route_id: &str,
        name: &str,
        country: &str,
        certificate_number: Option<String>,
    ) -> Result<CustomsCheckpoint> {
        Ok(self
            .customs
            .log_arrival(route_id, name, country, certificate_number, Utc::now())?)
    }

    /// Clear a checkpoint and charge the wait-time penalty to the escrow
    ///
    /// Returns the cleared checkpoint and the penalty charged. A route
    /// without an escrow clears free of charge.
    pub fn clear_checkpoint(
        &self,
        checkpoint_id: Uuid,
        notes: Option<String>,
    ) -> Result<(CustomsCheckpoint, Decimal)> {
        let checkpoint = self.customs.clear(checkpoint_id, notes, Utc::now())?;
        let wait_hours = checkpoint.wait_hours.unwrap_or(Decimal::ZERO);

        let penalty = match self
            .escrows
            .apply_customs_penalty(&checkpoint.route_id, wait_hours)
        {
            Ok(penalty) => penalty,
            Err(Error::RouteNotFound(_)) => Decimal::ZERO,
            Err(e) => return Err(e),
        };

        Ok((checkpoint, penalty))
    }

    /// Pull a checkpoint aside for physical inspection
    pub fn hold_checkpoint(&self, checkpoint_id: Uuid) -> Result<CustomsCheckpoint> {
        Ok(self.customs.hold_for_inspection(checkpoint_id)?)
    }

    /// Refuse entry at a checkpoint
    pub fn reject_checkpoint(&self, checkpoint_id: Uuid) -> Result<CustomsCheckpoint> {
        Ok(self.customs.reject(checkpoint_id)?)
    }

    /// Issue a signed phytosanitary certificate
    pub fn issue_certificate(&self, request: IssueRequest) -> Result<PhytoCertificate> {
        Ok(self.certificates.issue(request, Utc::now())?)
    }

    /// Verify a certificate's signature
    pub fn verify_certificate(&self, certificate_number: &str) -> Result<VerificationOutcome> {
        Ok(self.certificates.verify(certificate_number)?)
    }

    /// Destination authority accepts a certificate
    pub fn accept_certificate(&self, certificate_number: &str) -> Result<PhytoCertificate> {
        Ok(self.certificates.accept(certificate_number)?)
    }

    /// Destination authority rejects a certificate
    pub fn reject_certificate(&self, certificate_number: &str) -> Result<PhytoCertificate> {
        Ok(self.certificates.reject(certificate_number)?)
    }

    /// Admin resolution of a disputed escrow
    pub fn resolve_dispute(
        &self,
        escrow_id: Uuid,
        resolution: DisputeResolution,
    ) -> Result<FreightEscrow> {
        self.escrows.resolve_dispute(escrow_id, resolution, Utc::now())
    }

    /// Full status view for a route
    pub fn escrow_status(&self, route_id: &str) -> Result<EscrowView> {
        let escrow = self.escrows.by_route(route_id)?;
        Ok(EscrowView {
            escrow,
            checkpoints: self.customs.checkpoints_for_route(route_id),
            latest_telemetry: self.telemetry.latest(route_id),
        })
    }

    /// Run all background sweeps once
    ///
    /// Timeout stale holds, reprice fuel surcharges from the latest
    /// telemetry, flag overdue checkpoints and expire certificates.
    /// Every sweep is idempotent at a fixed `now`.
    pub fn run_sweeps(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let disputed_escrows = self.escrows.timeout_sweep(now);

        let mut repriced_routes = Vec::new();
        for route_id in self.escrows.held_routes() {
            if let Some(fuel_price) = self.telemetry.latest_fuel_price(&route_id) {
                match self.escrows.reprice_fuel(&route_id, fuel_price) {
                    Ok(Some(_)) => repriced_routes.push(route_id),
                    Ok(None) => {}
                    Err(Error::RouteNotFound(_)) | Err(Error::EscrowNotFound(_)) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        let stale_checkpoints = self.customs.stale_sweep(self.config.customs_stale_hours, now);
        let expired_certificates = self.certificates.expire_sweep(now);

        tracing::info!(
            disputed = disputed_escrows.len(),
            repriced = repriced_routes.len(),
            stale = stale_checkpoints.len(),
            expired = expired_certificates,
            "Sweep run complete"
        );

        Ok(SweepReport {
            disputed_escrows,
            repriced_routes,
            stale_checkpoints,
            expired_certificates,
        })
    }

    /// Evaluate a raw position against a route's fence without telemetry
    pub fn check_position(&self, route_id: &str, lat: f64, lng: f64) -> Result<bool> {
        let escrow = self.escrows.by_route(route_id)?;
        let point = GeoPoint::new(lat, lng);
        if !point.is_valid() {
            return Err(Error::Validation(format!(
                "Invalid coordinates ({}, {})",
                lat, lng
            )));
        }
        Ok(crate::geofence::is_within(point, &escrow.destination))
    }

    /// Derived ledger balance of the driver's receivable account
    pub fn driver_balance(&self, driver_id: &str) -> Result<Decimal> {
        let code = ledger_core::types::AccountCode::new(format!("DRV-{}-RECEIVABLE", driver_id));
        Ok(self.ledger.account_balance(&code)?)
    }

    /// Effective price components for a would-be lock, without locking
    pub fn quote(&self, distance_km: Decimal, fuel_price: Decimal) -> (Decimal, Decimal, Decimal) {
        let base = pricing::base_price(distance_km);
        let surcharge = pricing::fuel_surcharge(base, fuel_price);
        (base, surcharge, base + surcharge)
    }

    /// Ledger engine handle
    pub fn ledger(&self) -> &Arc<LedgerEngine> {
        &self.ledger
    }

    /// Escrow manager handle
    pub fn escrows(&self) -> &Arc<EscrowManager> {
        &self.escrows
    }

    /// Configured sweep interval
    pub fn config(&self) -> &Config {
        &self.config
    }
}
