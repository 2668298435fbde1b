use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of a finished show, returned by `end` and kept in the run journal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShowRun {
    pub id: String,
    pub plan_id: String,
    pub show_id: Option<String>,
    pub title: String,
    pub activated_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub elapsed_minutes: f64,
    pub final_segment_index: usize,
    pub segment_count: usize,
}

impl ShowRun {
    pub fn planned_segments_reached(&self) -> usize {
        if self.segment_count == 0 {
            0
        } else {
            (self.final_segment_index + 1).min(self.segment_count)
        }
    }
}
