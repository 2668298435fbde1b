//! Local snapshotting plus best-effort remote mirroring.
//!
//! Local state is authoritative for the live session. The remote record is
//! an eventually-consistent mirror: a missing record or a failing store is
//! logged and retried by the next caller, and never feeds back into the
//! local timeline.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::models::{LocalSnapshot, RemoteKey, RemotePatch, Segment, ShowHealth, TimerStateProjection};
use crate::{log_debug, log_error, log_warn};

use super::local::LocalStore;
use super::remote::RemoteStore;

const ENABLE_LOGS: bool = true;

const TIMER_STATE_FIELD: &str = "timerState";

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Updated,
    /// The remote record has not been created yet.
    RecordMissing,
    /// Nothing to sync (no plan, or no show/host identity).
    Skipped,
    Failed(String),
}

/// What one remote sync projects, captured at invocation time.
#[derive(Debug, Clone)]
pub struct SyncPayload {
    pub key: RemoteKey,
    pub segments: Vec<Segment>,
    pub health: ShowHealth,
    pub timer: TimerStateProjection,
}

pub struct PersistenceCoordinator {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    local_key: String,
}

impl PersistenceCoordinator {
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        local_key: impl Into<String>,
    ) -> Self {
        Self {
            local,
            remote,
            local_key: local_key.into(),
        }
    }

    pub async fn save_local(&self, snapshot: &LocalSnapshot) -> Result<()> {
        let serialized =
            serde_json::to_string(snapshot).context("failed to serialize local snapshot")?;
        self.local
            .set(&self.local_key, serialized)
            .await
            .with_context(|| format!("failed to write local snapshot '{}'", self.local_key))
    }

    /// A corrupt snapshot is reported and treated as absent.
    pub async fn load_local(&self) -> Option<LocalSnapshot> {
        let raw = match self.local.get(&self.local_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                log_error!("Failed to read local snapshot: {:#}", err);
                return None;
            }
        };

        match serde_json::from_str::<LocalSnapshot>(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                log_error!("Failed to restore plan state: {}", err);
                None
            }
        }
    }

    pub async fn clear_local(&self) -> Result<()> {
        self.local
            .remove(&self.local_key)
            .await
            .with_context(|| format!("failed to clear local snapshot '{}'", self.local_key))
    }

    pub async fn sync_remote(&self, payload: &SyncPayload) -> SyncOutcome {
        let existing = match self.remote.find(&payload.key).await {
            Ok(Some(existing)) => existing,
            Ok(None) => {
                log_warn!(
                    "Plan for show {} / host {} not yet saved remotely; skipping sync",
                    payload.key.show_id,
                    payload.key.host_id
                );
                return SyncOutcome::RecordMissing;
            }
            Err(err) => {
                log_error!("Remote plan lookup failed: {}", err);
                return SyncOutcome::Failed(err.to_string());
            }
        };

        let patch = RemotePatch {
            current_plan: Some(payload.segments.clone()),
            actual_engagement_curve: Some(payload.health.engagement_curve.clone()),
            plan_effectiveness: Some(payload.health.effectiveness_score),
            metadata: Some(with_timer_state(existing.metadata, &payload.timer)),
            updated_at: Some(payload.timer.last_updated),
        };

        match self.remote.partial_update(&payload.key, &patch).await {
            Ok(()) => {
                log_debug!(
                    "Synced timeline for show {} (segment {}, {:.1} min)",
                    payload.key.show_id,
                    payload.timer.current_segment_index,
                    payload.timer.elapsed_minutes
                );
                SyncOutcome::Updated
            }
            Err(err) => {
                log_error!("Failed to sync timeline to remote store: {}", err);
                SyncOutcome::Failed(err.to_string())
            }
        }
    }

    /// Removes only the nested timer projection from the remote record.
    pub async fn clear_remote_timer(&self, key: &RemoteKey, now: DateTime<Utc>) -> SyncOutcome {
        let existing = match self.remote.find(key).await {
            Ok(Some(existing)) => existing,
            Ok(None) => return SyncOutcome::RecordMissing,
            Err(err) => {
                log_error!("Remote plan lookup failed while clearing timer: {}", err);
                return SyncOutcome::Failed(err.to_string());
            }
        };

        let mut metadata = into_object(existing.metadata);
        if metadata.remove(TIMER_STATE_FIELD).is_none() {
            return SyncOutcome::Skipped;
        }

        let patch = RemotePatch {
            metadata: Some(Value::Object(metadata)),
            updated_at: Some(now),
            ..RemotePatch::default()
        };
        match self.remote.partial_update(key, &patch).await {
            Ok(()) => SyncOutcome::Updated,
            Err(err) => {
                log_error!("Failed to clear remote timer state: {}", err);
                SyncOutcome::Failed(err.to_string())
            }
        }
    }
}

fn into_object(metadata: Option<Value>) -> Map<String, Value> {
    match metadata {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn with_timer_state(metadata: Option<Value>, timer: &TimerStateProjection) -> Value {
    let mut metadata = into_object(metadata);
    let projection = serde_json::to_value(timer).unwrap_or(Value::Null);
    metadata.insert(TIMER_STATE_FIELD.to_string(), projection);
    Value::Object(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EngagementPoint, ShowPlan};
    use crate::persistence::{MemoryLocalStore, MemoryRemoteStore};
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, 20, 0, 0).unwrap()
    }

    fn plan() -> ShowPlan {
        serde_json::from_value(json!({
            "id": "plan-1",
            "showId": "show-1",
            "segments": [
                { "id": "a", "order": 1, "name": "Intro", "duration": 5 },
                { "id": "b", "order": 2, "name": "Main", "duration": 20 }
            ]
        }))
        .unwrap()
    }

    fn payload(key: RemoteKey) -> SyncPayload {
        SyncPayload {
            key,
            segments: plan().segments,
            health: ShowHealth {
                engagement_curve: vec![EngagementPoint { minute: 1.0, engagement: 0.7 }],
                effectiveness_score: Some(0.82),
            },
            timer: TimerStateProjection {
                current_segment_index: 1,
                elapsed_minutes: 6.0,
                timer_running: true,
                last_updated: now(),
            },
        }
    }

    fn coordinator() -> (PersistenceCoordinator, Arc<MemoryLocalStore>, Arc<MemoryRemoteStore>) {
        let local = Arc::new(MemoryLocalStore::new());
        let remote = Arc::new(MemoryRemoteStore::new());
        let coordinator = PersistenceCoordinator::new(local.clone(), remote.clone(), "active_plan_state");
        (coordinator, local, remote)
    }

    #[tokio::test]
    async fn local_snapshot_round_trips_and_clears() {
        let (coordinator, local, _) = coordinator();
        let snapshot = LocalSnapshot {
            plan: plan(),
            segment_index: 1,
            elapsed_minutes: 6.5,
            timer_running: false,
            accumulated_minutes: Some(6.5),
            host_id: Some("host-a".into()),
            activated_at: Some(now()),
            last_updated: now(),
        };

        coordinator.save_local(&snapshot).await.unwrap();
        assert_eq!(coordinator.load_local().await, Some(snapshot));

        coordinator.clear_local().await.unwrap();
        assert!(!local.contains("active_plan_state"));
        assert_eq!(coordinator.load_local().await, None);
    }

    #[tokio::test]
    async fn corrupt_snapshot_loads_as_absent() {
        let (coordinator, local, _) = coordinator();
        local
            .set("active_plan_state", "{not json".into())
            .await
            .unwrap();
        assert_eq!(coordinator.load_local().await, None);
    }

    #[tokio::test]
    async fn absent_remote_record_is_not_created() {
        let (coordinator, _, remote) = coordinator();
        let outcome = coordinator.sync_remote(&payload(RemoteKey::new("show-1", "host-a"))).await;

        assert_eq!(outcome, SyncOutcome::RecordMissing);
        assert!(remote.is_empty());
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test]
    async fn sync_overwrites_only_engine_fields() {
        let (coordinator, _, remote) = coordinator();
        let key = RemoteKey::new("show-1", "host-a");
        remote.insert(
            key.clone(),
            json!({
                "id": 42,
                "show_id": "show-1",
                "host_id": "host-a",
                "original_plan": ["imported"],
                "predicted_engagement_curve": [0.4, 0.6],
                "metadata": { "title": "Friday Stream", "panelists": ["Abe"] }
            }),
        );

        assert_eq!(coordinator.sync_remote(&payload(key.clone())).await, SyncOutcome::Updated);

        let document = remote.record(&key).unwrap();
        assert_eq!(document["original_plan"], json!(["imported"]));
        assert_eq!(document["predicted_engagement_curve"], json!([0.4, 0.6]));
        assert_eq!(document["metadata"]["title"], "Friday Stream");
        assert_eq!(document["metadata"]["panelists"], json!(["Abe"]));
        assert_eq!(document["metadata"]["timerState"]["currentSegmentIndex"], 1);
        assert_eq!(document["metadata"]["timerState"]["timerRunning"], true);
        assert_eq!(document["current_plan"][1]["name"], "Main");
        assert_eq!(document["plan_effectiveness"], 0.82);
        assert_eq!(document["actual_engagement_curve"][0]["engagement"], 0.7);
    }

    #[tokio::test]
    async fn remote_failure_is_contained() {
        let (coordinator, local, remote) = coordinator();
        let key = RemoteKey::new("show-1", "host-a");
        remote.insert(key.clone(), json!({ "id": 1 }));
        remote.set_unavailable(true);
        local.set("active_plan_state", "untouched".into()).await.unwrap();

        let outcome = coordinator.sync_remote(&payload(key.clone())).await;
        assert!(matches!(outcome, SyncOutcome::Failed(_)));
        assert_eq!(local.get("active_plan_state").await.unwrap().as_deref(), Some("untouched"));

        remote.set_unavailable(false);
        assert_eq!(coordinator.sync_remote(&payload(key)).await, SyncOutcome::Updated);
    }

    #[tokio::test]
    async fn clearing_timer_keeps_other_metadata() {
        let (coordinator, _, remote) = coordinator();
        let key = RemoteKey::new("show-1", "host-a");
        remote.insert(key.clone(), json!({ "id": 1, "metadata": { "title": "T" } }));
        coordinator.sync_remote(&payload(key.clone())).await;

        assert_eq!(coordinator.clear_remote_timer(&key, now()).await, SyncOutcome::Updated);
        let document = remote.record(&key).unwrap();
        assert_eq!(document["metadata"], json!({ "title": "T" }));

        assert_eq!(coordinator.clear_remote_timer(&key, now()).await, SyncOutcome::Skipped);
    }
}
