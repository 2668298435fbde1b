use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::models::LocalSnapshot;

const MS_PER_MINUTE: f64 = 60_000.0;

/// Source of wall-clock instants. Injected so tests can move time by hand.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard += by;
    }

    pub fn advance_minutes(&self, minutes: f64) {
        self.advance(chrono::Duration::milliseconds((minutes * MS_PER_MINUTE) as i64));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds().max(0) as f64 / MS_PER_MINUTE
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Idle,
    Running,
    Paused,
    Ended,
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Idle
    }
}

impl Phase {
    pub fn has_active_plan(&self) -> bool {
        matches!(self, Phase::Running | Phase::Paused)
    }
}

/// Stopwatch over wall-clock timestamps. Elapsed time is recomputed from
/// the run-start instant on every read, so missed ticks never drift it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimelineClock {
    /// Minutes credited from finished running windows and manual nudges.
    pub accumulated_minutes: f64,
    #[serde(skip)]
    pub run_started_at: Option<DateTime<Utc>>,
    pub is_running: bool,
}

impl TimelineClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when already running.
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_running {
            return false;
        }
        self.run_started_at = Some(now);
        self.is_running = true;
        true
    }

    /// Folds the running window into the baseline. Returns false when not running.
    pub fn pause(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_running {
            return false;
        }
        self.accumulated_minutes += self.running_minutes(now);
        self.run_started_at = None;
        self.is_running = false;
        true
    }

    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> f64 {
        self.accumulated_minutes + self.running_minutes(now)
    }

    /// Nudges the baseline, never below zero.
    pub fn adjust(&mut self, delta_minutes: f64) {
        if !delta_minutes.is_finite() {
            return;
        }
        self.accumulated_minutes = (self.accumulated_minutes + delta_minutes).max(0.0);
    }

    /// A running clock that lost its start instant restarts counting from
    /// `now`; whatever happened in between is not credited.
    pub fn reanchor(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_running && self.run_started_at.is_none() {
            self.run_started_at = Some(now);
            return true;
        }
        false
    }

    fn running_minutes(&self, now: DateTime<Utc>) -> f64 {
        match (self.is_running, self.run_started_at) {
            (true, Some(started)) => minutes_between(started, now),
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimelineState {
    #[serde(flatten)]
    pub clock: TimelineClock,
    pub current_segment_index: usize,
}

impl TimelineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> f64 {
        self.clock.elapsed_minutes(now)
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running
    }

    /// Rebuilds the timeline from a local snapshot. The credited minutes
    /// become the new baseline and a running clock is re-anchored at `now`.
    pub fn restore(snapshot: &LocalSnapshot, now: DateTime<Utc>) -> Self {
        let segment_count = snapshot.plan.segments.len();
        let current_segment_index = if segment_count == 0 {
            0
        } else {
            snapshot.segment_index.min(segment_count - 1)
        };

        let mut clock = TimelineClock {
            accumulated_minutes: snapshot.credited_minutes(),
            run_started_at: None,
            is_running: snapshot.timer_running,
        };
        clock.reanchor(now);

        Self {
            clock,
            current_segment_index,
        }
    }
}
