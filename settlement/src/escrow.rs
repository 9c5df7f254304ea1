//! Escrow lifecycle management
//!
//! Holds freight payments until a geo-fenced delivery proof arrives, then
//! releases exactly once. The Held -> Released transition and its ledger
//! posting happen under the escrow's map guard, so concurrent pings for
//! the same route cannot double-release: one wins, the rest observe the
//! terminal state and no-op.

use crate::{
    geofence,
    pricing,
    types::{
        DisputeResolution, EscrowStatus, FreightEscrow, GeoFence, GeoPoint, LockRequest,
        PingOutcome,
    },
    Error, Result,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry as RouteEntry;
use dashmap::DashMap;
use ledger_core::{
    types::{AccountCode, AccountOwner, AccountType, Currency, EntryDraft, TransactionType},
    LedgerEngine,
};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

const ESCROW_LIABILITY_CODE: &str = "PLATFORM-ESCROW-LIABILITY";

/// Manages freight escrows and their ledger postings
pub struct EscrowManager {
    /// Escrows by ID
    escrows: DashMap<Uuid, FreightEscrow>,

    /// Live escrow per route
    route_index: DashMap<String, Uuid>,

    /// Double-entry ledger
    ledger: Arc<LedgerEngine>,

    /// Days a hold may stay open before the timeout sweep disputes it
    timeout_days: i64,
}

impl EscrowManager {
    /// Create a manager backed by the given ledger
    pub fn new(ledger: Arc<LedgerEngine>, timeout_days: i64) -> Self {
        Self {
            escrows: DashMap::new(),
            route_index: DashMap::new(),
            ledger,
            timeout_days,
        }
    }

    /// Lock a freight payment into escrow
    ///
    /// Prices the route (base + fuel surcharge), creates the ledger
    /// accounts if needed and posts the hold. A route with a live
    /// (non-terminal) escrow cannot be locked again.
    pub fn lock(&self, request: LockRequest, now: DateTime<Utc>) -> Result<FreightEscrow> {
        if request.route_id.trim().is_empty() {
            return Err(Error::Validation("route_id must not be empty".to_string()));
        }
        if request.driver_id.trim().is_empty() {
            return Err(Error::Validation("driver_id must not be empty".to_string()));
        }
        let center = GeoPoint::new(request.dest_lat, request.dest_lng);
        if !center.is_valid() {
            return Err(Error::Validation(format!(
                "Invalid destination coordinates ({}, {})",
                request.dest_lat, request.dest_lng
            )));
        }
        if !request.radius_m.is_finite() || request.radius_m <= 0.0 {
            return Err(Error::Validation(
                "Geo-fence radius must be positive".to_string(),
            ));
        }
        if request.distance_km <= Decimal::ZERO {
            return Err(Error::Validation(
                "Route distance must be positive".to_string(),
            ));
        }
        if request.fuel_price < Decimal::ZERO {
            return Err(Error::Validation(
                "Fuel price must not be negative".to_string(),
            ));
        }

        // Route entry guard held across check, ledger post and insert:
        // two concurrent locks for one route cannot both hold funds
        let route_entry = self.route_index.entry(request.route_id.clone());
        if let RouteEntry::Occupied(ref occupied) = route_entry {
            if let Some(existing) = self.escrows.get(occupied.get()) {
                if !existing.status.is_terminal() {
                    return Err(Error::Validation(format!(
                        "Route {} already has a live escrow {}",
                        request.route_id, existing.escrow_id
                    )));
                }
            }
        }

        let base_price = pricing::base_price(request.distance_km);
        let fuel_surcharge = pricing::fuel_surcharge(base_price, request.fuel_price);
        let total = base_price + fuel_surcharge;

        let (escrow_account, driver_account) = self.ensure_accounts(&request.driver_id)?;
        let escrow_id = Uuid::now_v7();

        let hold = self.ledger.post_transaction(
            TransactionType::EscrowHold,
            format!("Escrow hold for route {}", request.route_id),
            Currency::USD,
            vec![
                EntryDraft::debit(escrow_account, total, Currency::USD, "escrow hold"),
                EntryDraft::credit(driver_account, total, Currency::USD, "escrow hold"),
            ],
            Some(escrow_id.to_string()),
        )?;

        let escrow = FreightEscrow {
            escrow_id,
            route_id: request.route_id.clone(),
            driver_id: request.driver_id,
            base_price,
            fuel_surcharge,
            customs_delay_penalty: Decimal::ZERO,
            total_freight_amount: total,
            final_amount: None,
            destination: GeoFence {
                center,
                radius_m: request.radius_m,
            },
            delivery_point: None,
            geo_fence_passed: false,
            delivery_proof_hash: None,
            status: EscrowStatus::Held,
            created_at: now,
            released_at: None,
            hold_transaction_id: hold.transaction_id,
            release_transaction_id: None,
        };

        self.escrows.insert(escrow_id, escrow.clone());
        match route_entry {
            RouteEntry::Occupied(mut occupied) => {
                occupied.insert(escrow_id);
            }
            RouteEntry::Vacant(vacant) => {
                vacant.insert(escrow_id);
            }
        }

        tracing::info!(
            escrow_id = %escrow_id,
            route_id = %request.route_id,
            total = %total,
            "Escrow locked"
        );

        Ok(escrow)
    }

    /// Evaluate a GPS position against the route's delivery fence
    ///
    /// A position inside the fence on a Held escrow triggers the release:
    /// the final amount is computed exactly once (total minus accumulated
    /// penalties, floored at zero), the delivery proof hash is recorded
    /// and the release posts to the ledger. Pings against non-Held
    /// escrows change nothing. A failed ledger post leaves the escrow
    /// Held so a later ping can retry.
    pub fn evaluate_geo_fence(
        &self,
        route_id: &str,
        point: GeoPoint,
        recorded_at: DateTime<Utc>,
    ) -> Result<PingOutcome> {
        let escrow_id = *self
            .route_index
            .get(route_id)
            .ok_or_else(|| Error::RouteNotFound(route_id.to_string()))?
            .value();

        // Guard held for the whole check-then-release critical section
        let mut escrow = self
            .escrows
            .get_mut(&escrow_id)
            .ok_or_else(|| Error::EscrowNotFound(escrow_id.to_string()))?;

        if escrow.status != EscrowStatus::Held {
            return Ok(PingOutcome::no_op());
        }

        if !geofence::is_within(point, &escrow.destination) {
            return Ok(PingOutcome::no_op());
        }

        let final_amount =
            pricing::final_amount(escrow.total_freight_amount, escrow.customs_delay_penalty);
        let proof_hash = delivery_proof_hash(route_id, point, recorded_at);

        let release_transaction_id = if final_amount > Decimal::ZERO {
            let (escrow_account, driver_account) = self.ensure_accounts(&escrow.driver_id)?;
            let release = self.ledger.post_transaction(
                TransactionType::EscrowRelease,
                format!("Escrow release for route {}", route_id),
                Currency::USD,
                vec![
                    EntryDraft::debit(driver_account, final_amount, Currency::USD, "delivery"),
                    EntryDraft::credit(escrow_account, final_amount, Currency::USD, "delivery"),
                ],
                Some(escrow.escrow_id.to_string()),
            )?;
            Some(release.transaction_id)
        } else {
            // Penalties consumed the entire hold; nothing to pay out
            None
        };

        escrow.status = EscrowStatus::Released;
        escrow.final_amount = Some(final_amount);
        escrow.delivery_point = Some(point);
        escrow.geo_fence_passed = true;
        escrow.delivery_proof_hash = Some(proof_hash);
        escrow.released_at = Some(recorded_at);
        escrow.release_transaction_id = release_transaction_id;

        tracing::info!(
            escrow_id = %escrow.escrow_id,
            route_id = %route_id,
            final_amount = %final_amount,
            "Escrow released on delivery proof"
        );

        Ok(PingOutcome {
            geo_fence_passed: true,
            escrow_released: true,
            final_amount: Some(final_amount),
        })
    }

    /// Apply a customs wait-time penalty to the route's escrow
    ///
    /// Returns the penalty amount charged for this checkpoint. Waits
    /// within the grace window charge nothing. Escrows that are no
    /// longer Held cannot be re-priced; the penalty is dropped with a
    /// warning.
    pub fn apply_customs_penalty(&self, route_id: &str, wait_hours: Decimal) -> Result<Decimal> {
        let escrow_id = *self
            .route_index
            .get(route_id)
            .ok_or_else(|| Error::RouteNotFound(route_id.to_string()))?
            .value();

        let mut escrow = self
            .escrows
            .get_mut(&escrow_id)
            .ok_or_else(|| Error::EscrowNotFound(escrow_id.to_string()))?;

        let penalty = pricing::customs_penalty(wait_hours);
        if penalty == Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }

        if escrow.status != EscrowStatus::Held {
            tracing::warn!(
                escrow_id = %escrow.escrow_id,
                status = ?escrow.status,
                %penalty,
                "Customs penalty dropped: escrow no longer held"
            );
            return Ok(Decimal::ZERO);
        }

        escrow.customs_delay_penalty += penalty;

        tracing::info!(
            escrow_id = %escrow.escrow_id,
            route_id = %route_id,
            %wait_hours,
            %penalty,
            accumulated = %escrow.customs_delay_penalty,
            "Customs delay penalty applied"
        );

        Ok(penalty)
    }

    /// Recompute the fuel surcharge from a fresh fuel price
    ///
    /// Only Held escrows reprice, and only when the surcharge moves by
    /// more than the materiality threshold. Returns the new surcharge
    /// when a reprice happened.
    pub fn reprice_fuel(&self, route_id: &str, fuel_price: Decimal) -> Result<Option<Decimal>> {
        let escrow_id = *self
            .route_index
            .get(route_id)
            .ok_or_else(|| Error::RouteNotFound(route_id.to_string()))?
            .value();

        let mut escrow = self
            .escrows
            .get_mut(&escrow_id)
            .ok_or_else(|| Error::EscrowNotFound(escrow_id.to_string()))?;

        if escrow.status != EscrowStatus::Held {
            return Ok(None);
        }

        let new_surcharge = pricing::fuel_surcharge(escrow.base_price, fuel_price);
        let drift = (new_surcharge - escrow.fuel_surcharge).abs();
        if drift <= pricing::FUEL_REPRICE_MATERIALITY {
            return Ok(None);
        }

        let old = escrow.fuel_surcharge;
        escrow.fuel_surcharge = new_surcharge;
        escrow.total_freight_amount = escrow.base_price + new_surcharge;

        tracing::info!(
            escrow_id = %escrow.escrow_id,
            route_id = %route_id,
            old_surcharge = %old,
            new_surcharge = %new_surcharge,
            "Fuel surcharge repriced"
        );

        Ok(Some(new_surcharge))
    }

    /// Move stale holds into dispute
    ///
    /// Held escrows older than the configured timeout become Disputed and
    /// wait for an admin resolution. Idempotent: already-disputed escrows
    /// are skipped, so repeated sweeps return each escrow at most once.
    pub fn timeout_sweep(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        let cutoff = now - Duration::days(self.timeout_days);
        let mut disputed = Vec::new();

        for mut entry in self.escrows.iter_mut() {
            if entry.status == EscrowStatus::Held && entry.created_at < cutoff {
                entry.status = EscrowStatus::Disputed;
                disputed.push(entry.escrow_id);
                tracing::warn!(
                    escrow_id = %entry.escrow_id,
                    route_id = %entry.route_id,
                    created_at = %entry.created_at,
                    "Escrow timed out, moved to dispute"
                );
            }
        }

        disputed
    }

    /// Resolve a disputed escrow by admin decision
    ///
    /// Release pays the driver the final amount (penalties still apply);
    /// Refund unwinds the hold in full. Only Disputed escrows resolve.
    pub fn resolve_dispute(
        &self,
        escrow_id: Uuid,
        resolution: DisputeResolution,
        now: DateTime<Utc>,
    ) -> Result<FreightEscrow> {
        let mut escrow = self
            .escrows
            .get_mut(&escrow_id)
            .ok_or_else(|| Error::EscrowNotFound(escrow_id.to_string()))?;

        if escrow.status != EscrowStatus::Disputed {
            return Err(Error::Validation(format!(
                "Escrow {} is {:?}, only Disputed escrows resolve",
                escrow_id, escrow.status
            )));
        }

        let (escrow_account, driver_account) = self.ensure_accounts(&escrow.driver_id)?;

        match resolution {
            DisputeResolution::Release => {
                let final_amount = pricing::final_amount(
                    escrow.total_freight_amount,
                    escrow.customs_delay_penalty,
                );
                if final_amount > Decimal::ZERO {
                    let release = self.ledger.post_transaction(
                        TransactionType::EscrowRelease,
                        format!("Dispute release for route {}", escrow.route_id),
                        Currency::USD,
                        vec![
                            EntryDraft::debit(
                                driver_account,
                                final_amount,
                                Currency::USD,
                                "dispute release",
                            ),
                            EntryDraft::credit(
                                escrow_account,
                                final_amount,
                                Currency::USD,
                                "dispute release",
                            ),
                        ],
                        Some(escrow_id.to_string()),
                    )?;
                    escrow.release_transaction_id = Some(release.transaction_id);
                }
                escrow.final_amount = Some(final_amount);
                escrow.status = EscrowStatus::Released;
                escrow.released_at = Some(now);
            }
            DisputeResolution::Refund => {
                let refund = self.ledger.post_transaction(
                    TransactionType::EscrowRefund,
                    format!("Dispute refund for route {}", escrow.route_id),
                    Currency::USD,
                    vec![
                        EntryDraft::debit(
                            driver_account,
                            escrow.total_freight_amount,
                            Currency::USD,
                            "hold unwound",
                        ),
                        EntryDraft::credit(
                            escrow_account,
                            escrow.total_freight_amount,
                            Currency::USD,
                            "hold unwound",
                        ),
                    ],
                    Some(escrow_id.to_string()),
                )?;
                escrow.release_transaction_id = Some(refund.transaction_id);
                escrow.final_amount = Some(Decimal::ZERO);
                escrow.status = EscrowStatus::Refunded;
                escrow.released_at = Some(now);
            }
        }

        tracing::info!(
            escrow_id = %escrow_id,
            resolution = ?resolution,
            status = ?escrow.status,
            "Dispute resolved"
        );

        Ok(escrow.clone())
    }

    /// Escrow by ID
    pub fn get(&self, escrow_id: Uuid) -> Result<FreightEscrow> {
        self.escrows
            .get(&escrow_id)
            .map(|e| e.clone())
            .ok_or_else(|| Error::EscrowNotFound(escrow_id.to_string()))
    }

    /// Routes with a Held escrow, for the reprice sweep
    pub fn held_routes(&self) -> Vec<String> {
        self.escrows
            .iter()
            .filter(|e| e.status == EscrowStatus::Held)
            .map(|e| e.route_id.clone())
            .collect()
    }

    /// The route's current escrow
    pub fn by_route(&self, route_id: &str) -> Result<FreightEscrow> {
        let escrow_id = *self
            .route_index
            .get(route_id)
            .ok_or_else(|| Error::RouteNotFound(route_id.to_string()))?
            .value();
        self.get(escrow_id)
    }

    fn ensure_accounts(&self, driver_id: &str) -> Result<(AccountCode, AccountCode)> {
        let escrow_account = self.ledger.get_or_create_account(
            AccountCode::new(ESCROW_LIABILITY_CODE),
            AccountType::Liability,
            Currency::USD,
            AccountOwner::Platform,
            true,
        )?;
        let driver_account = self.ledger.get_or_create_account(
            AccountCode::new(format!("DRV-{}-RECEIVABLE", driver_id)),
            AccountType::Asset,
            Currency::USD,
            AccountOwner::Driver(driver_id.to_string()),
            false,
        )?;
        Ok((escrow_account.code, driver_account.code))
    }
}

/// SHA-256 delivery proof over route, confirmed position and timestamp
fn delivery_proof_hash(route_id: &str, point: GeoPoint, recorded_at: DateTime<Utc>) -> String {
    let material = format!(
        "{}|{:.6}|{:.6}|{}",
        route_id,
        point.lat,
        point.lng,
        recorded_at.to_rfc3339()
    );
    let digest = Sha256::digest(material.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
