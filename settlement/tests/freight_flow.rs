//! End-to-end settlement flows across ledger, escrow, telemetry,
//! certificates and customs.

use chrono::{Duration, TimeZone, Utc};
use compliance_service::IssueRequest;
use ledger_core::types::AccountCode;
use rust_decimal::Decimal;
use settlement::{
    Config, DisputeResolution, EscrowStatus, GeoPoint, LockRequest, PingRequest,
    SettlementOrchestrator,
};
use std::sync::Barrier;
use tempfile::TempDir;

fn test_orchestrator() -> (SettlementOrchestrator, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.ledger_data_dir = temp_dir.path().to_path_buf();
    (SettlementOrchestrator::new(config).unwrap(), temp_dir)
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Nairobi -> Kampala, 500 km, fuel at 1.50/l
fn kampala_route() -> LockRequest {
    LockRequest {
        route_id: "RT-500".to_string(),
        driver_id: "DRV-7".to_string(),
        dest_lat: 0.3476,
        dest_lng: 32.5825,
        radius_m: 250.0,
        distance_km: Decimal::from(500),
        fuel_price: Decimal::new(150, 2),
    }
}

fn ping(lat: f64, lng: f64) -> PingRequest {
    PingRequest {
        route_id: "RT-500".to_string(),
        vehicle_id: "TRK-12".to_string(),
        lat,
        lng,
        speed_kmh: 60.0,
        fuel_price: Decimal::new(150, 2),
    }
}

fn coffee_certificate() -> IssueRequest {
    IssueRequest {
        route_id: "RT-500".to_string(),
        batch_id: "BATCH-2026-08-A1".to_string(),
        origin_country: "KE".to_string(),
        destination_country: "UG".to_string(),
        commodity: "Arabica coffee beans".to_string(),
        declared_quantity_kg: Decimal::from(12_000),
    }
}

#[test]
fn clean_delivery_pays_full_amount() {
    let (orchestrator, _temp) = test_orchestrator();

    let escrow = orchestrator.lock_escrow(kampala_route()).unwrap();
    assert_eq!(escrow.base_price, dec("425.00"));
    assert_eq!(escrow.fuel_surcharge, dec("106.25"));
    assert_eq!(escrow.total_freight_amount, dec("531.25"));

    // En route, nothing happens
    let en_route = orchestrator.ingest_ping(ping(0.0514, 34.2822)).unwrap();
    assert!(!en_route.geo_fence_passed);
    assert!(!en_route.escrow_released);

    // Inside the Kampala fence
    let arrival = orchestrator.ingest_ping(ping(0.3476, 32.5825)).unwrap();
    assert!(arrival.geo_fence_passed);
    assert!(arrival.escrow_released);
    assert_eq!(arrival.final_amount, Some(dec("531.25")));

    let view = orchestrator.escrow_status("RT-500").unwrap();
    assert_eq!(view.escrow.status, EscrowStatus::Released);
    assert_eq!(view.escrow.final_amount, Some(dec("531.25")));
    assert_eq!(view.escrow.delivery_proof_hash.as_ref().unwrap().len(), 64);
}

#[test]
fn customs_delay_shrinks_the_payout() {
    let (orchestrator, _temp) = test_orchestrator();
    orchestrator.lock_escrow(kampala_route()).unwrap();

    // Six hours at the border: two billable hours at 8.50
    let charged = orchestrator
        .escrows()
        .apply_customs_penalty("RT-500", Decimal::from(6))
        .unwrap();
    assert_eq!(charged, dec("17.00"));

    let arrival = orchestrator.ingest_ping(ping(0.3476, 32.5825)).unwrap();
    assert_eq!(arrival.final_amount, Some(dec("514.25")));
}

#[test]
fn duplicate_arrival_pings_release_once() {
    let (orchestrator, _temp) = test_orchestrator();
    orchestrator.lock_escrow(kampala_route()).unwrap();

    let first = orchestrator.ingest_ping(ping(0.3476, 32.5825)).unwrap();
    let second = orchestrator.ingest_ping(ping(0.3476, 32.5825)).unwrap();
    let third = orchestrator.ingest_ping(ping(0.3476, 32.5825)).unwrap();

    assert!(first.escrow_released);
    assert!(!second.escrow_released);
    assert!(!third.escrow_released);

    // One hold and one release in the ledger, nothing more
    let view = orchestrator.escrow_status("RT-500").unwrap();
    let release_id = view.escrow.release_transaction_id.unwrap();
    let entries = orchestrator
        .ledger()
        .entries_for_transaction(release_id)
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(orchestrator.driver_balance("DRV-7").unwrap(), Decimal::ZERO);
}

#[test]
fn checkpoint_clearance_charges_the_escrow() {
    let (orchestrator, _temp) = test_orchestrator();
    orchestrator.lock_escrow(kampala_route()).unwrap();

    let checkpoint = orchestrator
        .log_arrival("RT-500", "Malaba Border Post", "KE", None)
        .unwrap();
    let (cleared, penalty) = orchestrator
        .clear_checkpoint(checkpoint.checkpoint_id, Some("ok".to_string()))
        .unwrap();

    // Cleared within seconds of arrival: grace window covers it
    assert_eq!(penalty, Decimal::ZERO);
    assert!(cleared.wait_hours.unwrap() < Decimal::ONE);

    let view = orchestrator.escrow_status("RT-500").unwrap();
    assert_eq!(view.checkpoints.len(), 1);
    assert_eq!(view.escrow.customs_delay_penalty, Decimal::ZERO);
}

#[test]
fn stale_hold_goes_to_dispute_and_refunds() {
    let (orchestrator, _temp) = test_orchestrator();
    let locked_at = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
    let escrow = orchestrator
        .escrows()
        .lock(kampala_route(), locked_at)
        .unwrap();

    let report = orchestrator
        .run_sweeps(locked_at + Duration::days(8))
        .unwrap();
    assert_eq!(report.disputed_escrows, vec![escrow.escrow_id]);

    // Delivery pings against a disputed escrow change nothing
    let outcome = orchestrator.ingest_ping(ping(0.3476, 32.5825)).unwrap();
    assert!(!outcome.escrow_released);

    let resolved = orchestrator
        .resolve_dispute(escrow.escrow_id, DisputeResolution::Refund)
        .unwrap();
    assert_eq!(resolved.status, EscrowStatus::Refunded);
    assert_eq!(resolved.final_amount, Some(Decimal::ZERO));

    // Hold and refund cancel out
    assert_eq!(orchestrator.driver_balance("DRV-7").unwrap(), Decimal::ZERO);
}

#[test]
fn dispute_release_still_applies_penalties() {
    let (orchestrator, _temp) = test_orchestrator();
    let locked_at = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
    let escrow = orchestrator
        .escrows()
        .lock(kampala_route(), locked_at)
        .unwrap();

    orchestrator
        .escrows()
        .apply_customs_penalty("RT-500", Decimal::from(6))
        .unwrap();
    orchestrator
        .run_sweeps(locked_at + Duration::days(8))
        .unwrap();

    let resolved = orchestrator
        .resolve_dispute(escrow.escrow_id, DisputeResolution::Release)
        .unwrap();
    assert_eq!(resolved.status, EscrowStatus::Released);
    assert_eq!(resolved.final_amount, Some(dec("514.25")));
}

#[test]
fn certificate_travels_with_the_route() {
    let (orchestrator, _temp) = test_orchestrator();
    orchestrator.lock_escrow(kampala_route()).unwrap();

    let certificate = orchestrator.issue_certificate(coffee_certificate()).unwrap();
    let number = certificate.payload.certificate_number.clone();

    let checkpoint = orchestrator
        .log_arrival("RT-500", "Malaba Border Post", "KE", Some(number.clone()))
        .unwrap();
    assert_eq!(checkpoint.certificate_number, Some(number.clone()));

    let outcome = orchestrator.verify_certificate(&number).unwrap();
    assert!(outcome.valid);

    orchestrator.accept_certificate(&number).unwrap();
    orchestrator
        .clear_checkpoint(checkpoint.checkpoint_id, None)
        .unwrap();

    let arrival = orchestrator.ingest_ping(ping(0.3476, 32.5825)).unwrap();
    assert!(arrival.escrow_released);
}

#[test]
fn fuel_spike_reprices_before_release() {
    let (orchestrator, _temp) = test_orchestrator();
    orchestrator.lock_escrow(kampala_route()).unwrap();

    let mut spike = ping(0.0514, 34.2822);
    spike.fuel_price = dec("1.80");
    orchestrator.ingest_ping(spike).unwrap();

    let report = orchestrator.run_sweeps(Utc::now()).unwrap();
    assert_eq!(report.repriced_routes, vec!["RT-500".to_string()]);

    // 425 * (1.80 - 1.20) / 1.20 = 212.50
    let arrival = orchestrator.ingest_ping(ping(0.3476, 32.5825)).unwrap();
    assert_eq!(arrival.final_amount, Some(dec("637.50")));
}

#[test]
fn concurrent_arrival_pings_release_exactly_once() {
    let (orchestrator, _temp) = test_orchestrator();
    orchestrator.lock_escrow(kampala_route()).unwrap();

    let barrier = Barrier::new(6);
    let released = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..6)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    orchestrator
                        .escrows()
                        .evaluate_geo_fence("RT-500", GeoPoint::new(0.3476, 32.5825), Utc::now())
                        .unwrap()
                        .escrow_released
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count()
    });

    assert_eq!(released, 1);

    // One hold credit and one release debit; the losers posted nothing
    let entries = orchestrator
        .ledger()
        .entries_for_account(&AccountCode::new("DRV-7-RECEIVABLE"))
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(orchestrator.driver_balance("DRV-7").unwrap(), Decimal::ZERO);

    let view = orchestrator.escrow_status("RT-500").unwrap();
    assert_eq!(view.escrow.status, EscrowStatus::Released);
    assert_eq!(view.escrow.final_amount, Some(dec("531.25")));
}

#[test]
fn concurrent_locks_hold_funds_once() {
    let (orchestrator, _temp) = test_orchestrator();

    let barrier = Barrier::new(4);
    let locked = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    orchestrator.lock_escrow(kampala_route()).is_ok()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count()
    });

    assert_eq!(locked, 1);

    // Exactly one hold reached the ledger
    let entries = orchestrator
        .ledger()
        .entries_for_account(&AccountCode::new("DRV-7-RECEIVABLE"))
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].base_amount, dec("531.25"));

    let view = orchestrator.escrow_status("RT-500").unwrap();
    assert_eq!(view.escrow.status, EscrowStatus::Held);
}

#[test]
fn penalties_never_drive_the_payout_negative() {
    let (orchestrator, _temp) = test_orchestrator();

    // Short cheap route: 10 km, no surcharge -> 8.50 held
    let escrow = orchestrator
        .lock_escrow(LockRequest {
            route_id: "RT-10".to_string(),
            driver_id: "DRV-9".to_string(),
            dest_lat: 0.3476,
            dest_lng: 32.5825,
            radius_m: 250.0,
            distance_km: Decimal::from(10),
            fuel_price: Decimal::ONE,
        })
        .unwrap();
    assert_eq!(escrow.total_freight_amount, dec("8.50"));

    // 40 hours of customs wait: 306.00 in penalties
    orchestrator
        .escrows()
        .apply_customs_penalty("RT-10", Decimal::from(40))
        .unwrap();

    let mut arrival = ping(0.3476, 32.5825);
    arrival.route_id = "RT-10".to_string();
    let outcome = orchestrator.ingest_ping(arrival).unwrap();

    assert!(outcome.escrow_released);
    assert_eq!(outcome.final_amount, Some(Decimal::ZERO));

    let view = orchestrator.escrow_status("RT-10").unwrap();
    assert_eq!(view.escrow.status, EscrowStatus::Released);
    // Zero payout means no release posting
    assert!(view.escrow.release_transaction_id.is_none());
}
