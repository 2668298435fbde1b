pub mod deviation;
pub mod timing;

pub use deviation::Deviation;
pub use timing::{SegmentStatus, SegmentTiming, SegmentWindow};
