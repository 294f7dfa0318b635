//! Diff between two position snapshots of the same observer-target pair

use serde::{Deserialize, Serialize};

use crate::core::types::TokenId;
use crate::position::state::{validate_position_state, PositionState, ValidationOutcome};

/// Direction of a stealth transition on the concealment ladder
///
/// "Improved" means the sneaking creature ended *more concealed* relative
/// to this observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    Improved,
    Worsened,
    Unchanged,
}

/// Visibility sub-diff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityTransition {
    pub from: crate::core::types::Visibility,
    pub to: crate::core::types::Visibility,
    pub changed: bool,
}

/// Cover sub-diff, including the stealth-bonus delta
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverTransition {
    pub from: crate::core::types::CoverLevel,
    pub to: crate::core::types::CoverLevel,
    pub changed: bool,
    pub bonus_change: i16,
}

/// Diff of one observer's start and end snapshots; derived, never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionTransition {
    pub target_id: TokenId,
    pub start_position: PositionState,
    pub end_position: PositionState,
    pub has_changed: bool,
    pub visibility_changed: bool,
    pub cover_changed: bool,
    pub transition_type: TransitionType,
    pub avs_transition: VisibilityTransition,
    pub cover_transition: CoverTransition,
}

/// Diff two snapshots of the same pair
///
/// Snapshots are copied in by value; the transition owns its endpoints.
pub fn analyze_transition(
    target_id: TokenId,
    start: &PositionState,
    end: &PositionState,
) -> PositionTransition {
    let visibility_changed = start.visibility != end.visibility;
    let cover_changed = start.cover != end.cover;

    let transition_type = match end.visibility.cmp(&start.visibility) {
        std::cmp::Ordering::Greater => TransitionType::Improved,
        std::cmp::Ordering::Less => TransitionType::Worsened,
        std::cmp::Ordering::Equal => TransitionType::Unchanged,
    };

    PositionTransition {
        target_id,
        start_position: start.clone(),
        end_position: end.clone(),
        has_changed: start != end,
        visibility_changed,
        cover_changed,
        transition_type,
        avs_transition: VisibilityTransition {
            from: start.visibility,
            to: end.visibility,
            changed: visibility_changed,
        },
        cover_transition: CoverTransition {
            from: start.cover,
            to: end.cover,
            changed: cover_changed,
            bonus_change: end.stealth_bonus as i16 - start.stealth_bonus as i16,
        },
    }
}

/// Validate a transition record, recursing into both embedded snapshots
///
/// Unlike scalar fields, the two snapshots have no defaults: the record is
/// invalid without them, which the type system already guarantees here;
/// what remains is their internal consistency and the diff flags.
pub fn validate_position_transition(transition: &PositionTransition) -> ValidationOutcome {
    let mut errors = Vec::new();

    let start = validate_position_state(&transition.start_position);
    errors.extend(start.errors.into_iter().map(|e| format!("start: {e}")));

    let end = validate_position_state(&transition.end_position);
    errors.extend(end.errors.into_iter().map(|e| format!("end: {e}")));

    let expected_unchanged =
        transition.start_position.visibility == transition.end_position.visibility;
    if (transition.transition_type == TransitionType::Unchanged) != expected_unchanged {
        errors.push(
            "transition_type must be 'unchanged' exactly when start and end visibility match"
                .to_string(),
        );
    }

    if transition.visibility_changed == expected_unchanged {
        errors.push("visibility_changed flag disagrees with the embedded snapshots".to_string());
    }

    if transition.cover_changed
        != (transition.start_position.cover != transition.end_position.cover)
    {
        errors.push("cover_changed flag disagrees with the embedded snapshots".to_string());
    }

    ValidationOutcome::failed(errors)
}
