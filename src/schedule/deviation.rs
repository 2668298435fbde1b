use std::fmt;

use serde::{Deserialize, Serialize};

use super::timing::SegmentTiming;

/// Where the show stands against the current segment's planned window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Deviation {
    Ahead { minutes: f64 },
    Behind { minutes: f64 },
    OnTrack,
}

pub fn compute(elapsed_minutes: f64, timing: SegmentTiming) -> Deviation {
    if elapsed_minutes < timing.start {
        Deviation::Ahead {
            minutes: timing.start - elapsed_minutes,
        }
    } else if elapsed_minutes > timing.end {
        Deviation::Behind {
            minutes: elapsed_minutes - timing.end,
        }
    } else {
        Deviation::OnTrack
    }
}

impl Deviation {
    pub fn magnitude(&self) -> Option<f64> {
        match self {
            Deviation::Ahead { minutes } | Deviation::Behind { minutes } => Some(*minutes),
            Deviation::OnTrack => None,
        }
    }

    pub fn is_on_track(&self) -> bool {
        matches!(self, Deviation::OnTrack)
    }
}

impl fmt::Display for Deviation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deviation::Ahead { minutes } => write!(f, "{minutes:.0} minutes ahead of the plan"),
            Deviation::Behind { minutes } => write!(f, "{minutes:.0} minutes behind"),
            Deviation::OnTrack => write!(f, "on track"),
        }
    }
}
