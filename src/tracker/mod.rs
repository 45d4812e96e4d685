pub mod history;
pub mod identity;
pub mod motion;
pub mod smooth;

pub use history::{SnapshotHistory, WindowAverage};
pub use identity::{FrameAssignment, IdentityTracker, PersonId, TrackedPerson};
pub use motion::{
    aggregate, per_person_delta, MovementDelta, MovementQuantifier, MovementSnapshot,
};
pub use smooth::Smoother;
