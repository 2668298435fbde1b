//! Serialized forms of the timeline: the local snapshot and the
//! projection mirrored into the remote show record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::plan::{Segment, ShowPlan};

/// Written to the local store on every state-affecting command.
///
/// The run-start instant is intentionally absent: a snapshot restored
/// while running re-anchors at restore time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocalSnapshot {
    pub plan: ShowPlan,
    #[serde(default)]
    pub segment_index: usize,
    #[serde(default)]
    pub elapsed_minutes: f64,
    #[serde(default)]
    pub timer_running: bool,
    #[serde(default)]
    pub accumulated_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
}

impl LocalSnapshot {
    /// Minutes already credited when the snapshot was taken.
    pub fn credited_minutes(&self) -> f64 {
        let elapsed = sanitize_minutes(self.elapsed_minutes);
        match self.accumulated_minutes.map(sanitize_minutes) {
            Some(accumulated) => accumulated.max(elapsed),
            None => elapsed,
        }
    }
}

fn sanitize_minutes(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EngagementPoint {
    pub minute: f64,
    pub engagement: f64,
}

/// Live analytics supplied by the co-host layer; only mirrored remotely.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShowHealth {
    #[serde(default)]
    pub engagement_curve: Vec<EngagementPoint>,
    #[serde(default)]
    pub effectiveness_score: Option<f64>,
}

/// Nested under `metadata.timerState` of the remote record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerStateProjection {
    pub current_segment_index: usize,
    pub elapsed_minutes: f64,
    pub timer_running: bool,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteKey {
    pub show_id: String,
    pub host_id: String,
}

impl RemoteKey {
    pub fn new(show_id: impl Into<String>, host_id: impl Into<String>) -> Self {
        Self {
            show_id: show_id.into(),
            host_id: host_id.into(),
        }
    }
}

/// The slice of the remote record this engine reads back.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RemoteSnapshot {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Engine-owned columns of the remote record. `None` fields are left
/// untouched by the update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RemotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_plan: Option<Vec<Segment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_engagement_curve: Option<Vec<EngagementPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_effectiveness: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}
