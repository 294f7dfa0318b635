//! Position snapshots and start/end transition analysis

mod state;
mod transition;

pub use state::{validate_position_state, PositionState, ValidationOutcome};
pub use transition::{
    analyze_transition, validate_position_transition, CoverTransition, PositionTransition,
    TransitionType, VisibilityTransition,
};
