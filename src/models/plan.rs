//! Show plan data as produced by the plan import flow.
//!
//! The engine only reads plans. Field names follow the import JSON; the
//! aliases accept the older snake_case export as well.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, alias = "estimatedDuration")]
    pub estimated_duration_minutes: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: String,
    #[serde(default)]
    pub order: u32,
    pub name: String,
    #[serde(default, alias = "duration")]
    pub duration_minutes: f64,
    #[serde(default)]
    pub expected_engagement: f64,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Segment {
    /// Duration used for scheduling. Missing, negative or non-finite
    /// durations collapse to a zero-width window.
    pub fn effective_duration(&self) -> f64 {
        if self.duration_minutes.is_finite() && self.duration_minutes > 0.0 {
            self.duration_minutes
        } else {
            0.0
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.effective_duration() == 0.0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throughline: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub panelists: Vec<String>,
    /// Fields owned by other writers; carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SegmentEngagement {
    pub segment_id: String,
    pub predicted_engagement: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PredictedEngagementCurve {
    #[serde(default)]
    pub segments: Vec<SegmentEngagement>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShowPlan {
    pub id: String,
    #[serde(default, alias = "show_id")]
    pub show_id: Option<String>,
    pub segments: Vec<Segment>,
    #[serde(default, alias = "total_duration")]
    pub total_duration_minutes: f64,
    #[serde(default)]
    pub metadata: PlanMetadata,
    #[serde(
        default,
        alias = "predicted_engagement_curve",
        skip_serializing_if = "Option::is_none"
    )]
    pub predicted_engagement_curve: Option<PredictedEngagementCurve>,
}

impl ShowPlan {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn title(&self) -> &str {
        self.metadata.title.as_deref().unwrap_or("Untitled Show")
    }

    /// Advertised total, falling back to the sum of segment durations when
    /// the import left it empty.
    pub fn planned_duration(&self) -> f64 {
        if self.total_duration_minutes.is_finite() && self.total_duration_minutes > 0.0 {
            self.total_duration_minutes
        } else {
            self.segments.iter().map(Segment::effective_duration).sum()
        }
    }

    pub fn question_count(&self) -> usize {
        self.segments.iter().map(|s| s.questions.len()).sum()
    }

    pub fn malformed_segments(&self) -> Vec<usize> {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, segment)| segment.is_malformed())
            .map(|(index, _)| index)
            .collect()
    }

    pub fn predicted_engagement_for(&self, index: usize) -> Option<f64> {
        let segment = self.segments.get(index)?;
        self.predicted_engagement_curve
            .as_ref()?
            .segments
            .iter()
            .find(|entry| entry.segment_id == segment.id)
            .map(|entry| entry.predicted_engagement)
    }
}
