use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::ShowPlan;
use crate::schedule::{deviation, timing, Deviation, SegmentStatus};

use super::state::{Phase, TimelineState};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SegmentView {
    pub index: usize,
    pub id: String,
    pub order: u32,
    pub name: String,
    pub start: f64,
    pub end: f64,
    pub status: SegmentStatus,
    pub expected_engagement: f64,
    pub question_count: usize,
}

/// What the UI layer reads after every command and tick.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimelineView {
    pub phase: Phase,
    pub plan_id: Option<String>,
    pub title: Option<String>,
    pub current_segment_index: usize,
    pub elapsed_minutes: f64,
    pub is_running: bool,
    pub deviation: Option<Deviation>,
    /// The banner stays hidden until the show has accumulated any time.
    pub deviation_visible: bool,
    pub planned_duration_minutes: f64,
    pub progress_percent: f64,
    pub predicted_engagement: Option<f64>,
    pub segments: Vec<SegmentView>,
}

impl TimelineView {
    pub fn build(
        phase: Phase,
        plan: Option<&ShowPlan>,
        timeline: &TimelineState,
        now: DateTime<Utc>,
    ) -> Self {
        let elapsed_minutes = timeline.elapsed_minutes(now);
        let current = timeline.current_segment_index;

        let Some(plan) = plan else {
            return Self {
                phase,
                plan_id: None,
                title: None,
                current_segment_index: current,
                elapsed_minutes,
                is_running: timeline.is_running(),
                deviation: None,
                deviation_visible: false,
                planned_duration_minutes: 0.0,
                progress_percent: 0.0,
                predicted_engagement: None,
                segments: Vec::new(),
            };
        };

        let segments = timing::windows(&plan.segments, current)
            .into_iter()
            .zip(plan.segments.iter())
            .map(|(window, segment)| SegmentView {
                index: window.index,
                id: segment.id.clone(),
                order: segment.order,
                name: segment.name.clone(),
                start: window.timing.start,
                end: window.timing.end,
                status: window.status,
                expected_engagement: segment.expected_engagement,
                question_count: segment.questions.len(),
            })
            .collect();

        let deviation = deviation::compute(elapsed_minutes, timing::timing_for(&plan.segments, current));
        let planned = plan.planned_duration();

        Self {
            phase,
            plan_id: Some(plan.id.clone()),
            title: Some(plan.title().to_string()),
            current_segment_index: current,
            elapsed_minutes,
            is_running: timeline.is_running(),
            deviation: Some(deviation),
            deviation_visible: elapsed_minutes > 0.0 && !deviation.is_on_track(),
            planned_duration_minutes: planned,
            progress_percent: progress_percent(elapsed_minutes, planned),
            predicted_engagement: plan.predicted_engagement_for(current),
            segments,
        }
    }

    pub fn current_segment(&self) -> Option<&SegmentView> {
        self.segments.get(self.current_segment_index)
    }
}

pub fn progress_percent(elapsed_minutes: f64, planned_minutes: f64) -> f64 {
    if planned_minutes <= 0.0 {
        return 0.0;
    }
    (elapsed_minutes / planned_minutes * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn plan() -> ShowPlan {
        serde_json::from_value(serde_json::json!({
            "id": "plan-1",
            "totalDurationMinutes": 30,
            "metadata": { "title": "Friday Stream" },
            "segments": [
                { "id": "a", "order": 1, "name": "Intro", "duration": 10,
                  "questions": [{ "id": "q1" }, { "id": "q2" }] },
                { "id": "b", "order": 2, "name": "Main", "duration": 15 },
                { "id": "c", "order": 3, "name": "Outro", "duration": 5 }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn manual_selection_ahead_of_time_reports_ahead() {
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 19, 0, 0).unwrap();
        let mut timeline = TimelineState::new();
        timeline.clock.start(now);
        timeline.current_segment_index = 1;

        let view = TimelineView::build(Phase::Running, Some(&plan()), &timeline, now + Duration::minutes(5));

        assert_eq!(view.deviation, Some(Deviation::Ahead { minutes: 5.0 }));
        assert!(view.deviation_visible);
        assert_eq!(view.segments[0].status, SegmentStatus::Completed);
        assert_eq!(view.segments[1].status, SegmentStatus::Current);
        assert_eq!(view.segments[2].start, 25.0);
        assert_eq!(view.segments[0].question_count, 2);
        assert!((view.progress_percent - 100.0 / 6.0).abs() < 1e-9);
        assert_eq!(view.current_segment().map(|s| s.name.as_str()), Some("Main"));
    }

    #[test]
    fn banner_hidden_before_start() {
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 19, 0, 0).unwrap();
        let mut timeline = TimelineState::new();
        timeline.current_segment_index = 2;

        let view = TimelineView::build(Phase::Paused, Some(&plan()), &timeline, now);
        assert!(matches!(view.deviation, Some(Deviation::Ahead { .. })));
        assert!(!view.deviation_visible);
    }

    #[test]
    fn progress_is_capped() {
        assert_eq!(progress_percent(45.0, 30.0), 100.0);
        assert_eq!(progress_percent(3.0, 0.0), 0.0);
        assert_eq!(progress_percent(15.0, 30.0), 50.0);
    }
}
