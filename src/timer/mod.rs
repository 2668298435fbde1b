pub mod commands;
pub mod controller;
pub mod state;
pub mod view;

pub use controller::PlanController;
pub use state::{Clock, ManualClock, Phase, SystemClock, TimelineClock, TimelineState};
pub use view::{SegmentView, TimelineView};
