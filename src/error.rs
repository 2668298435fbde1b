use serde::ser::{SerializeStruct, Serializer};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimelineError {
    #[error("Plan has no segments to schedule")]
    EmptyPlan,

    #[error("No active show plan")]
    NoActivePlan,

    #[error("A show plan is already active")]
    PlanAlreadyActive,

    #[error("The show has ended")]
    ShowEnded,

    #[error("Segment {index} is out of range (plan has {len} segments)")]
    SegmentOutOfRange { index: usize, len: usize },
}

impl TimelineError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyPlan => "PLAN_EMPTY",
            Self::NoActivePlan => "PLAN_NOT_ACTIVE",
            Self::PlanAlreadyActive => "PLAN_ALREADY_ACTIVE",
            Self::ShowEnded => "SHOW_ENDED",
            Self::SegmentOutOfRange { .. } => "SEGMENT_OUT_OF_RANGE",
        }
    }
}

impl serde::Serialize for TimelineError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("TimelineError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Failures talking to the remote show store. A missing record is not one
/// of these; lookups report it as `Ok(None)`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    #[error("remote store returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("remote response could not be decoded: {0}")]
    Decode(String),
}
