pub mod keypoint;

pub use keypoint::{BodyRegion, Keypoint, KeypointIndex, Pose};
