pub mod plan;
pub mod run;
pub mod snapshot;

pub use plan::{PlanMetadata, PredictedEngagementCurve, Question, Segment, SegmentEngagement, ShowPlan};
pub use run::ShowRun;
pub use snapshot::{
    EngagementPoint, LocalSnapshot, RemoteKey, RemotePatch, RemoteSnapshot, ShowHealth,
    TimerStateProjection,
};
