//! End-to-end freight settlement walkthrough
//!
//! Locks an escrow for a Nairobi-bound coffee shipment, issues the
//! phytosanitary certificate, crosses a border checkpoint with a delay
//! penalty and releases the escrow on a geo-fenced delivery ping.

use anyhow::Result;
use rust_decimal::Decimal;
use settlement::{Config, LockRequest, PingRequest, SettlementOrchestrator};
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut config = Config::from_env()?;
    config.ledger_data_dir = std::env::temp_dir().join(format!(
        "agrirail-demo-{}",
        uuid::Uuid::new_v4().simple()
    ));
    let orchestrator = SettlementOrchestrator::new(config)?;

    info!("=== AgriRail freight settlement demo ===");

    // Phytosanitary certificate for the batch
    let certificate = orchestrator.issue_certificate(compliance_service::IssueRequest {
        route_id: "RT-500".to_string(),
        batch_id: "BATCH-2026-08-A1".to_string(),
        origin_country: "KE".to_string(),
        destination_country: "UG".to_string(),
        commodity: "Arabica coffee beans".to_string(),
        declared_quantity_kg: Decimal::from(12_000),
    })?;
    let cert_number = certificate.payload.certificate_number.clone();
    info!(certificate = %cert_number, "Certificate issued");

    let verification = orchestrator.verify_certificate(&cert_number)?;
    info!(valid = verification.valid, "Certificate verified");

    // Lock the freight payment: 500 km at fuel price 1.50/l
    let escrow = orchestrator.lock_escrow(LockRequest {
        route_id: "RT-500".to_string(),
        driver_id: "DRV-7".to_string(),
        dest_lat: 0.3476,
        dest_lng: 32.5825,
        radius_m: 250.0,
        distance_km: Decimal::from(500),
        fuel_price: Decimal::new(150, 2),
    })?;
    info!(
        escrow_id = %escrow.escrow_id,
        base = %escrow.base_price,
        surcharge = %escrow.fuel_surcharge,
        total = %escrow.total_freight_amount,
        "Escrow locked"
    );

    // Border crossing at Malaba; six hours waiting means two billable hours
    let checkpoint =
        orchestrator.log_arrival("RT-500", "Malaba Border Post", "KE", Some(cert_number.clone()))?;
    let penalty = orchestrator
        .escrows()
        .apply_customs_penalty("RT-500", Decimal::from(6))?;
    info!(checkpoint = %checkpoint.checkpoint_id, %penalty, "Customs delay charged");
    orchestrator.clear_checkpoint(checkpoint.checkpoint_id, Some("documents in order".into()))?;
    orchestrator.accept_certificate(&cert_number)?;

    // En-route ping, still far from the fence
    let en_route = orchestrator.ingest_ping(PingRequest {
        route_id: "RT-500".to_string(),
        vehicle_id: "TRK-12".to_string(),
        lat: 0.0514,
        lng: 34.2822,
        speed_kmh: 72.0,
        fuel_price: Decimal::new(150, 2),
    })?;
    info!(released = en_route.escrow_released, "En-route ping");

    // Arrival ping inside the Kampala fence releases the escrow
    let arrival = orchestrator.ingest_ping(PingRequest {
        route_id: "RT-500".to_string(),
        vehicle_id: "TRK-12".to_string(),
        lat: 0.3476,
        lng: 32.5825,
        speed_kmh: 4.0,
        fuel_price: Decimal::new(150, 2),
    })?;
    info!(
        released = arrival.escrow_released,
        final_amount = ?arrival.final_amount,
        "Arrival ping"
    );

    let view = orchestrator.escrow_status("RT-500")?;
    info!(
        status = ?view.escrow.status,
        proof = ?view.escrow.delivery_proof_hash,
        checkpoints = view.checkpoints.len(),
        "Final escrow state"
    );

    let report = orchestrator.run_sweeps(chrono::Utc::now())?;
    info!(
        disputed = report.disputed_escrows.len(),
        expired = report.expired_certificates,
        "Maintenance sweep"
    );

    Ok(())
}
