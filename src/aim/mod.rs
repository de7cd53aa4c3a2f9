//! Target acquisition: mode state, target selection and motion planning.

mod motion;
mod selector;
mod state;

pub use motion::{smoothed_displacement, Displacement, MotionOutcome, MotionPlanner, MotionSettings};
pub use selector::{SelectorSettings, Selection, Target, TargetSelector};
pub use state::{AimMode, AimState};
