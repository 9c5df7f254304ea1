//! Customs checkpoint tracking
//!
//! Records border arrivals and clearances per freight route and computes
//! the wait duration that feeds delay penalties downstream. A checkpoint
//! is cleared at most once.

use crate::error::{ComplianceError, Result};
use crate::types::{CheckpointStatus, CustomsCheckpoint};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

const SECONDS_PER_HOUR: i64 = 3600;

/// Customs checkpoint tracker
pub struct CustomsTracker {
    checkpoints: DashMap<Uuid, CustomsCheckpoint>,
    by_route: DashMap<String, Vec<Uuid>>,
}

impl CustomsTracker {
    /// Create empty tracker
    pub fn new() -> Self {
        Self {
            checkpoints: DashMap::new(),
            by_route: DashMap::new(),
        }
    }

    /// Record arrival at a border checkpoint
    pub fn log_arrival(
        &self,
        route_id: impl Into<String>,
        name: impl Into<String>,
        country: impl Into<String>,
        certificate_number: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CustomsCheckpoint> {
        let route_id = route_id.into();
        let name = name.into();
        let country = country.into();

        if route_id.is_empty() || name.is_empty() {
            return Err(ComplianceError::InvalidInput(
                "route_id and checkpoint name are required".to_string(),
            ));
        }
        if country.len() != 2 {
            return Err(ComplianceError::InvalidInput(
                "country must be an ISO 3166-1 alpha-2 code".to_string(),
            ));
        }

        let checkpoint = CustomsCheckpoint {
            checkpoint_id: Uuid::now_v7(),
            route_id: route_id.clone(),
            name,
            country,
            arrived_at: now,
            cleared_at: None,
            wait_hours: None,
            status: CheckpointStatus::Pending,
            certificate_number,
            notes: None,
        };

        info!(
            checkpoint_id = %checkpoint.checkpoint_id,
            route_id = %route_id,
            name = %checkpoint.name,
            "Checkpoint arrival logged"
        );

        self.by_route
            .entry(route_id)
            .or_default()
            .push(checkpoint.checkpoint_id);
        self.checkpoints
            .insert(checkpoint.checkpoint_id, checkpoint.clone());

        Ok(checkpoint)
    }

    /// Clear a pending or inspection-held checkpoint, computing the wait
    /// duration
    ///
    /// Fails if the checkpoint is absent, already cleared or refused
    /// entry.
    pub fn clear(
        &self,
        checkpoint_id: Uuid,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CustomsCheckpoint> {
        let mut checkpoint = self
            .checkpoints
            .get_mut(&checkpoint_id)
            .ok_or_else(|| ComplianceError::CheckpointNotFound(checkpoint_id.to_string()))?;

        match checkpoint.status {
            CheckpointStatus::Cleared => {
                return Err(ComplianceError::AlreadyCleared(checkpoint_id.to_string()));
            }
            CheckpointStatus::Rejected => {
                return Err(ComplianceError::InvalidTransition(format!(
                    "Checkpoint {} was refused entry",
                    checkpoint_id
                )));
            }
            CheckpointStatus::Pending | CheckpointStatus::HeldForInspection => {}
        }

        let waited = now - checkpoint.arrived_at;
        let wait_hours =
            (Decimal::from(waited.num_seconds()) / Decimal::from(SECONDS_PER_HOUR)).round_dp(4);

        checkpoint.cleared_at = Some(now);
        checkpoint.wait_hours = Some(wait_hours);
        checkpoint.status = CheckpointStatus::Cleared;
        checkpoint.notes = notes;

        info!(
            checkpoint_id = %checkpoint_id,
            route_id = %checkpoint.route_id,
            wait_hours = %wait_hours,
            "Checkpoint cleared"
        );

        Ok(checkpoint.clone())
    }

    /// Pull a pending checkpoint aside for physical inspection
    pub fn hold_for_inspection(&self, checkpoint_id: Uuid) -> Result<CustomsCheckpoint> {
        self.transition_pending(checkpoint_id, CheckpointStatus::HeldForInspection)
    }

    /// Refuse entry at a pending or held checkpoint
    pub fn reject(&self, checkpoint_id: Uuid) -> Result<CustomsCheckpoint> {
        let mut checkpoint = self
            .checkpoints
            .get_mut(&checkpoint_id)
            .ok_or_else(|| ComplianceError::CheckpointNotFound(checkpoint_id.to_string()))?;

        match checkpoint.status {
            CheckpointStatus::Pending | CheckpointStatus::HeldForInspection => {
                checkpoint.status = CheckpointStatus::Rejected;
                warn!(checkpoint_id = %checkpoint_id, "Checkpoint rejected");
                Ok(checkpoint.clone())
            }
            other => Err(ComplianceError::InvalidTransition(format!(
                "Checkpoint {} is {:?}",
                checkpoint_id, other
            ))),
        }
    }

    fn transition_pending(
        &self,
        checkpoint_id: Uuid,
        to: CheckpointStatus,
    ) -> Result<CustomsCheckpoint> {
        let mut checkpoint = self
            .checkpoints
            .get_mut(&checkpoint_id)
            .ok_or_else(|| ComplianceError::CheckpointNotFound(checkpoint_id.to_string()))?;

        if checkpoint.status != CheckpointStatus::Pending {
            return Err(ComplianceError::InvalidTransition(format!(
                "Checkpoint {} is {:?}, expected Pending",
                checkpoint_id, checkpoint.status
            )));
        }

        checkpoint.status = to;
        Ok(checkpoint.clone())
    }

    /// Get checkpoint by ID
    pub fn get(&self, checkpoint_id: Uuid) -> Result<CustomsCheckpoint> {
        self.checkpoints
            .get(&checkpoint_id)
            .map(|c| c.clone())
            .ok_or_else(|| ComplianceError::CheckpointNotFound(checkpoint_id.to_string()))
    }

    /// All checkpoints of a route, in arrival order
    pub fn checkpoints_for_route(&self, route_id: &str) -> Vec<CustomsCheckpoint> {
        self.by_route
            .get(route_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.checkpoints.get(id).map(|c| c.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Flag pending checkpoints older than `max_pending_hours` for inspection
    ///
    /// Idempotent: already-flagged checkpoints are skipped on re-run.
    pub fn stale_sweep(&self, max_pending_hours: i64, now: DateTime<Utc>) -> Vec<Uuid> {
        let cutoff = now - Duration::hours(max_pending_hours);
        let mut flagged = Vec::new();

        for mut item in self.checkpoints.iter_mut() {
            let checkpoint = item.value_mut();
            if checkpoint.status == CheckpointStatus::Pending && checkpoint.arrived_at < cutoff {
                checkpoint.status = CheckpointStatus::HeldForInspection;
                flagged.push(checkpoint.checkpoint_id);
                warn!(
                    checkpoint_id = %checkpoint.checkpoint_id,
                    route_id = %checkpoint.route_id,
                    "Stale checkpoint held for inspection"
                );
            }
        }

        flagged
    }
}

impl Default for CustomsTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrival_and_clear() {
        let tracker = CustomsTracker::new();
        let arrived = Utc::now();

        let checkpoint = tracker
            .log_arrival("RT-1", "Malaba Border Post", "KE", None, arrived)
            .unwrap();
        assert_eq!(checkpoint.status, CheckpointStatus::Pending);
        assert!(checkpoint.wait_hours.is_none());

        let cleared = tracker
            .clear(
                checkpoint.checkpoint_id,
                Some("documents in order".to_string()),
                arrived + Duration::hours(6),
            )
            .unwrap();
        assert_eq!(cleared.status, CheckpointStatus::Cleared);
        assert_eq!(cleared.wait_hours, Some(Decimal::from(6)));
    }

    #[test]
    fn test_no_double_clearing() {
        let tracker = CustomsTracker::new();
        let arrived = Utc::now();
        let checkpoint = tracker
            .log_arrival("RT-1", "Busia Border Post", "UG", None, arrived)
            .unwrap();

        tracker
            .clear(checkpoint.checkpoint_id, None, arrived + Duration::hours(1))
            .unwrap();
        let result = tracker.clear(
            checkpoint.checkpoint_id,
            None,
            arrived + Duration::hours(2),
        );
        assert!(matches!(result, Err(ComplianceError::AlreadyCleared(_))));
    }

    #[test]
    fn test_clear_unknown_checkpoint() {
        let tracker = CustomsTracker::new();
        let result = tracker.clear(Uuid::new_v4(), None, Utc::now());
        assert!(matches!(
            result,
            Err(ComplianceError::CheckpointNotFound(_))
        ));
    }

    #[test]
    fn test_rejected_checkpoint_cannot_clear() {
        let tracker = CustomsTracker::new();
        let arrived = Utc::now();
        let checkpoint = tracker
            .log_arrival("RT-1", "Malaba Border Post", "KE", None, arrived)
            .unwrap();

        tracker.reject(checkpoint.checkpoint_id).unwrap();

        // Refused entry is final; no clearance, no wait hours charged
        let result = tracker.clear(
            checkpoint.checkpoint_id,
            None,
            arrived + Duration::hours(6),
        );
        assert!(matches!(result, Err(ComplianceError::InvalidTransition(_))));
        assert!(tracker.get(checkpoint.checkpoint_id).unwrap().wait_hours.is_none());
    }

    #[test]
    fn test_inspection_hold_can_still_clear() {
        let tracker = CustomsTracker::new();
        let arrived = Utc::now();
        let checkpoint = tracker
            .log_arrival("RT-1", "Busia Border Post", "UG", None, arrived)
            .unwrap();

        tracker.hold_for_inspection(checkpoint.checkpoint_id).unwrap();

        let cleared = tracker
            .clear(checkpoint.checkpoint_id, None, arrived + Duration::hours(2))
            .unwrap();
        assert_eq!(cleared.status, CheckpointStatus::Cleared);
        assert_eq!(cleared.wait_hours, Some(Decimal::from(2)));
    }

    #[test]
    fn test_fractional_wait_hours() {
        let tracker = CustomsTracker::new();
        let arrived = Utc::now();
        let checkpoint = tracker
            .log_arrival("RT-2", "Namanga", "TZ".to_string(), None, arrived)
            .unwrap();

        let cleared = tracker
            .clear(
                checkpoint.checkpoint_id,
                None,
                arrived + Duration::minutes(90),
            )
            .unwrap();
        assert_eq!(cleared.wait_hours, Some(Decimal::new(15, 1))); // 1.5h
    }

    #[test]
    fn test_checkpoints_for_route() {
        let tracker = CustomsTracker::new();
        let now = Utc::now();

        tracker.log_arrival("RT-3", "First", "KE", None, now).unwrap();
        tracker.log_arrival("RT-3", "Second", "UG", None, now).unwrap();
        tracker.log_arrival("RT-4", "Other", "ET", None, now).unwrap();

        let checkpoints = tracker.checkpoints_for_route("RT-3");
        assert_eq!(checkpoints.len(), 2);
        assert_eq!(checkpoints[0].name, "First");
        assert!(tracker.checkpoints_for_route("RT-missing").is_empty());
    }

    #[test]
    fn test_stale_sweep_idempotent() {
        let tracker = CustomsTracker::new();
        let now = Utc::now();

        let stale = tracker
            .log_arrival("RT-5", "Old", "KE", None, now - Duration::hours(72))
            .unwrap();
        tracker.log_arrival("RT-5", "Fresh", "KE", None, now).unwrap();

        let flagged = tracker.stale_sweep(48, now);
        assert_eq!(flagged, vec![stale.checkpoint_id]);
        assert_eq!(
            tracker.get(stale.checkpoint_id).unwrap().status,
            CheckpointStatus::HeldForInspection
        );

        // Re-run finds nothing overdue
        assert!(tracker.stale_sweep(48, now).is_empty());
    }

    #[test]
    fn test_inspection_hold_and_reject() {
        let tracker = CustomsTracker::new();
        let now = Utc::now();
        let checkpoint = tracker
            .log_arrival("RT-6", "Moyale", "ET", None, now)
            .unwrap();

        let held = tracker.hold_for_inspection(checkpoint.checkpoint_id).unwrap();
        assert_eq!(held.status, CheckpointStatus::HeldForInspection);

        let rejected = tracker.reject(checkpoint.checkpoint_id).unwrap();
        assert_eq!(rejected.status, CheckpointStatus::Rejected);

        // Terminal: no further transitions
        assert!(tracker.hold_for_inspection(checkpoint.checkpoint_id).is_err());
    }
}
