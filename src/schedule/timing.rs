//! Segment windows derived from the ordered list of durations.
//!
//! Every surface that needs segment start/end times goes through these
//! functions. Nothing here caches: windows are recomputed from the slice
//! passed in, so a mutated plan is picked up on the next call.

use serde::{Deserialize, Serialize};

use crate::models::Segment;

/// Half-open window `[start, end)` in show minutes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SegmentTiming {
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SegmentStatus {
    Completed,
    Current,
    Upcoming,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SegmentWindow {
    pub index: usize,
    pub timing: SegmentTiming,
    pub status: SegmentStatus,
}

/// Prefix sum of the durations before `index`, plus the segment's own.
/// An index past the end yields a zero-width window at the plan's end.
pub fn timing_for(segments: &[Segment], index: usize) -> SegmentTiming {
    let start: f64 = segments
        .iter()
        .take(index)
        .map(Segment::effective_duration)
        .sum();
    let own = segments
        .get(index)
        .map(Segment::effective_duration)
        .unwrap_or(0.0);

    SegmentTiming {
        start,
        end: start + own,
    }
}

pub fn status_for(index: usize, current_index: usize) -> SegmentStatus {
    match index.cmp(&current_index) {
        std::cmp::Ordering::Less => SegmentStatus::Completed,
        std::cmp::Ordering::Equal => SegmentStatus::Current,
        std::cmp::Ordering::Greater => SegmentStatus::Upcoming,
    }
}

/// Moves at most one segment forward once the current window has been
/// used up. Callers re-evaluate on every tick to cross further boundaries.
pub fn advance(elapsed_minutes: f64, current_index: usize, segments: &[Segment]) -> usize {
    let has_next = current_index + 1 < segments.len();
    if has_next && elapsed_minutes >= timing_for(segments, current_index).end {
        current_index + 1
    } else {
        current_index
    }
}

/// All windows in one pass.
pub fn windows(segments: &[Segment], current_index: usize) -> Vec<SegmentWindow> {
    let mut cursor = 0.0;
    segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            let start = cursor;
            cursor += segment.effective_duration();
            SegmentWindow {
                index,
                timing: SegmentTiming { start, end: cursor },
                status: status_for(index, current_index),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(durations: &[f64]) -> Vec<Segment> {
        durations
            .iter()
            .enumerate()
            .map(|(i, d)| Segment {
                id: format!("seg-{i}"),
                order: i as u32 + 1,
                name: format!("Segment {}", i + 1),
                duration_minutes: *d,
                expected_engagement: 0.5,
                questions: Vec::new(),
                description: None,
            })
            .collect()
    }

    #[test]
    fn prefix_sum_windows() {
        let segments = plan(&[10.0, 15.0, 5.0]);
        assert_eq!(timing_for(&segments, 0), SegmentTiming { start: 0.0, end: 10.0 });
        assert_eq!(timing_for(&segments, 1), SegmentTiming { start: 10.0, end: 25.0 });
        assert_eq!(timing_for(&segments, 2), SegmentTiming { start: 25.0, end: 30.0 });

        let all: Vec<SegmentTiming> = windows(&segments, 0).iter().map(|w| w.timing).collect();
        assert_eq!(
            all,
            (0..3).map(|i| timing_for(&segments, i)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn out_of_range_index_is_zero_width_at_the_end() {
        let segments = plan(&[10.0, 15.0]);
        assert_eq!(timing_for(&segments, 5), SegmentTiming { start: 25.0, end: 25.0 });
    }

    #[test]
    fn advance_respects_window_end() {
        let segments = plan(&[10.0, 15.0, 5.0]);
        assert_eq!(advance(24.0, 1, &segments), 1);
        assert_eq!(advance(25.0, 1, &segments), 2);
        assert_eq!(advance(26.0, 1, &segments), 2);
    }

    #[test]
    fn advance_stops_at_last_segment() {
        let segments = plan(&[10.0, 15.0, 5.0]);
        assert_eq!(advance(500.0, 2, &segments), 2);
        assert_eq!(advance(0.0, 0, &[]), 0);
    }

    #[test]
    fn advance_moves_one_step_per_call() {
        let segments = plan(&[5.0, 5.0, 5.0, 5.0]);
        let mut index = 0;
        let mut steps = Vec::new();
        for _ in 0..5 {
            index = advance(100.0, index, &segments);
            steps.push(index);
        }
        assert_eq!(steps, vec![1, 2, 3, 3, 3]);
    }

    #[test]
    fn advance_never_moves_backward_after_manual_selection() {
        let segments = plan(&[10.0, 15.0, 5.0]);
        let index = advance(3.0, 2, &segments);
        assert_eq!(index, 2);
    }

    #[test]
    fn malformed_durations_do_not_block_later_segments() {
        let segments = plan(&[5.0, 0.0, f64::NAN, 10.0]);
        assert_eq!(timing_for(&segments, 1), SegmentTiming { start: 5.0, end: 5.0 });
        assert_eq!(timing_for(&segments, 3), SegmentTiming { start: 5.0, end: 15.0 });

        let mut index = 0;
        for _ in 0..3 {
            index = advance(5.0, index, &segments);
        }
        assert_eq!(index, 3);
    }

    #[test]
    fn status_relative_to_current() {
        assert_eq!(status_for(0, 1), SegmentStatus::Completed);
        assert_eq!(status_for(1, 1), SegmentStatus::Current);
        assert_eq!(status_for(2, 1), SegmentStatus::Upcoming);
    }
}
