//! GPS telemetry ingestion
//!
//! Append-only per-route ping log. Validation happens before the record
//! is stored; fence evaluation happens after, so a ping that arrives
//! while the escrow is already settled still lands in the log.

use crate::{
    types::{GeoPoint, PingRequest, TelemetryRecord},
    Error, Result,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;

/// Per-route telemetry store
#[derive(Default)]
pub struct TelemetryIngestor {
    records: DashMap<String, Vec<TelemetryRecord>>,
}

impl TelemetryIngestor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append a ping, returning the stored record
    pub fn ingest(&self, request: &PingRequest, now: DateTime<Utc>) -> Result<TelemetryRecord> {
        if request.route_id.trim().is_empty() {
            return Err(Error::Validation("route_id must not be empty".to_string()));
        }
        if request.vehicle_id.trim().is_empty() {
            return Err(Error::Validation(
                "vehicle_id must not be empty".to_string(),
            ));
        }
        let point = GeoPoint::new(request.lat, request.lng);
        if !point.is_valid() {
            return Err(Error::Validation(format!(
                "Invalid coordinates ({}, {})",
                request.lat, request.lng
            )));
        }
        if !request.speed_kmh.is_finite() || request.speed_kmh < 0.0 {
            return Err(Error::Validation("Speed must not be negative".to_string()));
        }
        if request.fuel_price < Decimal::ZERO {
            return Err(Error::Validation(
                "Fuel price must not be negative".to_string(),
            ));
        }

        let record = TelemetryRecord {
            route_id: request.route_id.clone(),
            vehicle_id: request.vehicle_id.clone(),
            point,
            speed_kmh: request.speed_kmh,
            fuel_price_per_liter: request.fuel_price,
            recorded_at: now,
        };

        self.records
            .entry(request.route_id.clone())
            .or_default()
            .push(record.clone());

        tracing::debug!(
            route_id = %request.route_id,
            vehicle_id = %request.vehicle_id,
            lat = request.lat,
            lng = request.lng,
            "Telemetry ping recorded"
        );

        Ok(record)
    }

    /// Most recent ping for a route
    pub fn latest(&self, route_id: &str) -> Option<TelemetryRecord> {
        self.records
            .get(route_id)
            .and_then(|records| records.last().cloned())
    }

    /// Most recently observed fuel price for a route
    pub fn latest_fuel_price(&self, route_id: &str) -> Option<Decimal> {
        self.latest(route_id).map(|r| r.fuel_price_per_liter)
    }

    /// Number of pings logged for a route
    pub fn ping_count(&self, route_id: &str) -> usize {
        self.records.get(route_id).map(|r| r.len()).unwrap_or(0)
    }
}
