//! Immutable snapshot of one observer-target relationship

use serde::{Deserialize, Serialize};

use crate::core::types::{now_ms, CoverLevel, Lighting, TimestampMs, Visibility};

/// Snapshot of visibility, cover, and geometry between two tokens at an
/// instant, captured at roll time before movement can invalidate it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    pub visibility: Visibility,
    /// Did the primary visibility calculator produce this value?
    pub visibility_calculated: bool,
    pub visibility_override: Option<String>,

    pub cover: CoverLevel,
    /// Did the cover detector produce this value?
    pub cover_calculated: bool,
    pub cover_override: Option<String>,

    /// Derived from `cover` via the fixed table; only an explicit override
    /// may decouple the two
    pub stealth_bonus: u8,

    pub distance: f32,
    pub has_line_of_sight: bool,
    pub lighting: Lighting,

    pub timestamp_ms: TimestampMs,
    /// Diagnostics accumulated while capturing, not exceptions
    pub system_errors: Vec<String>,
}

impl Default for PositionState {
    fn default() -> Self {
        let cover = CoverLevel::None;
        Self {
            visibility: Visibility::Observed,
            visibility_calculated: false,
            visibility_override: None,
            cover,
            cover_calculated: false,
            cover_override: None,
            stealth_bonus: cover.stealth_bonus(),
            distance: 0.0,
            has_line_of_sight: true,
            lighting: Lighting::Unknown,
            timestamp_ms: now_ms(),
            system_errors: Vec::new(),
        }
    }
}

impl PositionState {
    /// Snapshot with visibility and cover set and the stealth bonus derived
    pub fn with_states(visibility: Visibility, cover: CoverLevel) -> Self {
        Self {
            visibility,
            cover,
            stealth_bonus: cover.stealth_bonus(),
            ..Default::default()
        }
    }
}

/// Result of a validation pass; never an exception
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// Check a snapshot's dynamic invariants
///
/// Enum fields are valid by construction; what remains are the numeric
/// ranges and the stealth-bonus/cover coupling. Never mutates, never
/// panics.
pub fn validate_position_state(state: &PositionState) -> ValidationOutcome {
    let mut errors = Vec::new();

    if !state.distance.is_finite() || state.distance < 0.0 {
        errors.push(format!(
            "distance must be a non-negative finite number, got {}",
            state.distance
        ));
    }

    if state.timestamp_ms == 0 {
        errors.push("timestamp_ms must be positive".to_string());
    }

    let expected_bonus = state.cover.stealth_bonus();
    if state.stealth_bonus != expected_bonus && state.cover_override.is_none() {
        errors.push(format!(
            "stealth_bonus {} does not match cover '{}' (expected {}) and no override is present",
            state.stealth_bonus, state.cover, expected_bonus
        ));
    }

    ValidationOutcome::failed(errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_valid() {
        let outcome = validate_position_state(&PositionState::default());
        assert!(outcome.is_valid);
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn test_default_state_fields() {
        let state = PositionState::default();
        assert_eq!(state.visibility, Visibility::Observed);
        assert_eq!(state.cover, CoverLevel::None);
        assert_eq!(state.stealth_bonus, 0);
        assert_eq!(state.lighting, Lighting::Unknown);
        assert!(state.system_errors.is_empty());
        assert!(state.timestamp_ms > 0);
    }

    #[test]
    fn test_with_states_derives_bonus() {
        let state = PositionState::with_states(Visibility::Hidden, CoverLevel::Greater);
        assert_eq!(state.stealth_bonus, 4);
        assert!(validate_position_state(&state).is_valid);
    }

    #[test]
    fn test_negative_distance_rejected() {
        let state = PositionState {
            distance: -1.0,
            ..Default::default()
        };
        let outcome = validate_position_state(&state);
        assert!(!outcome.is_valid);
        assert!(outcome.errors[0].contains("distance"));
    }

    #[test]
    fn test_nan_distance_rejected() {
        let state = PositionState {
            distance: f32::NAN,
            ..Default::default()
        };
        assert!(!validate_position_state(&state).is_valid);
    }

    #[test]
    fn test_zero_timestamp_rejected() {
        let state = PositionState {
            timestamp_ms: 0,
            ..Default::default()
        };
        let outcome = validate_position_state(&state);
        assert!(outcome.errors.iter().any(|e| e.contains("timestamp")));
    }

    #[test]
    fn test_decoupled_bonus_rejected_without_override() {
        let state = PositionState {
            cover: CoverLevel::Standard,
            stealth_bonus: 4,
            ..Default::default()
        };
        assert!(!validate_position_state(&state).is_valid);
    }

    #[test]
    fn test_decoupled_bonus_allowed_with_override() {
        let state = PositionState {
            cover: CoverLevel::Standard,
            stealth_bonus: 4,
            cover_override: Some("feat: cover expert".to_string()),
            ..Default::default()
        };
        assert!(validate_position_state(&state).is_valid);
    }

    #[test]
    fn test_serde_roundtrip() {
        let state = PositionState::with_states(Visibility::Concealed, CoverLevel::Lesser);
        let json = serde_json::to_string(&state).unwrap();
        let back: PositionState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }
}
