//! Unified visibility + cover queries with tiered fallback
//!
//! One call answers both axes for a pair. Each axis tries its primary
//! calculator, then any already-stored value, then a conservative default;
//! failures become warning strings on the result, never errors.

use std::sync::Arc;

use ahash::AHashMap;
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::core::types::{now_ms, CoverLevel, Lighting, TokenId, Visibility};
use crate::cover::CoverDetector;
use crate::platform::{SettingsSource, Token, TokenStore, VisibilityCalculator};
use crate::position::PositionState;

/// Combined answer for one observer-target pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedState {
    pub visibility: Visibility,
    /// Did the primary visibility calculator produce the value, as opposed
    /// to a stored-value or default fallback?
    pub visibility_calculated: bool,
    pub cover: CoverLevel,
    /// Did the cover detector produce the value?
    pub cover_calculated: bool,
    pub stealth_bonus: u8,
    /// True when at least one axis came from its primary calculator
    pub calculated: bool,
    pub warnings: Vec<String>,
}

/// Options for a combined-state query
#[derive(Debug, Clone, Copy, Default)]
pub struct CombinedStateOptions {
    /// Evaluate the target as if it stood at this captured position.
    /// The live token is never touched; the recompute is pure.
    pub target_position: Option<Vec2>,
}

/// Facade over the external visibility calculator and the cover detector
pub struct UnifiedStateIntegration {
    visibility: Arc<dyn VisibilityCalculator>,
    tokens: Arc<dyn TokenStore>,
    settings: Arc<dyn SettingsSource>,
    cover: CoverDetector,
}

impl UnifiedStateIntegration {
    pub fn new(
        visibility: Arc<dyn VisibilityCalculator>,
        tokens: Arc<dyn TokenStore>,
        settings: Arc<dyn SettingsSource>,
        cover: CoverDetector,
    ) -> Self {
        Self {
            visibility,
            tokens,
            settings,
            cover,
        }
    }

    /// Combined visibility/cover state of `target` as seen by `observer`
    pub fn get_combined_state(
        &self,
        observer: &Token,
        target: &Token,
        options: CombinedStateOptions,
    ) -> CombinedState {
        let relocated;
        let target = match options.target_position {
            Some(position) => {
                relocated = target.at_position(position);
                &relocated
            }
            None => target,
        };

        let mut warnings = Vec::new();

        let (visibility, visibility_calculated) =
            match self.visibility.calculate_visibility(observer, target) {
                Ok(value) => (value, true),
                Err(error) => {
                    warnings.push(format!("visibility calculation failed: {error}"));
                    match self.tokens.stored_visibility(&observer.id, &target.id) {
                        Some(stored) => {
                            warnings.push("using stored visibility value".to_string());
                            (stored, false)
                        }
                        None => {
                            warnings.push(
                                "no stored visibility, defaulting to observed".to_string(),
                            );
                            (Visibility::Observed, false)
                        }
                    }
                }
            };

        let (cover, cover_calculated) = match self.cover.try_detect_between_tokens(observer, target)
        {
            Ok(value) => (value, true),
            Err(error) => {
                warnings.push(format!("cover calculation failed: {error}"));
                match self.tokens.stored_cover(&observer.id, &target.id) {
                    Some(stored) => {
                        warnings.push("using stored cover value".to_string());
                        (stored, false)
                    }
                    None => {
                        warnings.push("no stored cover, defaulting to none".to_string());
                        (CoverLevel::None, false)
                    }
                }
            }
        };

        CombinedState {
            visibility,
            visibility_calculated,
            cover,
            cover_calculated,
            stealth_bonus: cover.stealth_bonus(),
            calculated: visibility_calculated || cover_calculated,
            warnings,
        }
    }

    /// Combined state per observer, keyed by observer id
    ///
    /// No ordering guarantee among observers.
    pub fn get_batch_combined_states(
        &self,
        target: &Token,
        observers: &[Token],
    ) -> AHashMap<TokenId, CombinedState> {
        observers
            .iter()
            .map(|observer| {
                (
                    observer.id.clone(),
                    self.get_combined_state(observer, target, CombinedStateOptions::default()),
                )
            })
            .collect()
    }

    /// Full position snapshot for one pair: combined state plus geometry
    pub fn capture_position_state(
        &self,
        observer: &Token,
        target: &Token,
        options: CombinedStateOptions,
    ) -> PositionState {
        let combined = self.get_combined_state(observer, target, options);

        let relocated;
        let target = match options.target_position {
            Some(position) => {
                relocated = target.at_position(position);
                &relocated
            }
            None => target,
        };

        let grid = self.settings.settings().grid_size;
        let distance = if grid > 0.0 {
            observer.center.distance(target.center) / grid
        } else {
            0.0
        };

        PositionState {
            visibility: combined.visibility,
            visibility_calculated: combined.visibility_calculated,
            cover: combined.cover,
            cover_calculated: combined.cover_calculated,
            stealth_bonus: combined.stealth_bonus,
            distance,
            has_line_of_sight: self.cover.has_line_of_sight(observer, target),
            lighting: Lighting::Unknown,
            timestamp_ms: now_ms(),
            system_errors: combined.warnings,
            ..Default::default()
        }
    }

    pub fn cover_detector(&self) -> &CoverDetector {
        &self.cover
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Alliance, SizeRank, TokenRect};
    use crate::platform::memory::MemoryPlatform;
    use crate::platform::WallSpec;

    fn medium(id: &str, x: f32, y: f32) -> Token {
        Token {
            id: TokenId::new(id),
            center: Vec2::new(x, y),
            rect: TokenRect::centered(Vec2::new(x, y), 100.0, 100.0),
            size: SizeRank::Medium,
            alliance: Alliance::Neutral,
        }
    }

    fn integration(platform: &Arc<MemoryPlatform>) -> UnifiedStateIntegration {
        UnifiedStateIntegration::new(
            platform.clone(),
            platform.clone(),
            platform.clone(),
            CoverDetector::new(platform.clone(), platform.clone()),
        )
    }

    #[test]
    fn test_combined_state_happy_path() {
        let platform = Arc::new(MemoryPlatform::new());
        let integration = integration(&platform);
        let observer = medium("obs", 0.0, 0.0);
        let target = medium("tgt", 1000.0, 0.0);
        platform.set_stored_visibility(&observer.id, &target.id, Visibility::Concealed);

        let state =
            integration.get_combined_state(&observer, &target, CombinedStateOptions::default());
        assert_eq!(state.visibility, Visibility::Concealed);
        assert_eq!(state.cover, CoverLevel::None);
        assert!(state.calculated);
        assert!(state.warnings.is_empty());
    }

    #[test]
    fn test_visibility_fallback_to_stored_value() {
        let platform = Arc::new(MemoryPlatform::new());
        let integration = integration(&platform);
        let observer = medium("obs", 0.0, 0.0);
        let target = medium("tgt", 1000.0, 0.0);
        platform.set_stored_visibility(&observer.id, &target.id, Visibility::Hidden);
        platform.fail_visibility_calc(true);

        let state =
            integration.get_combined_state(&observer, &target, CombinedStateOptions::default());
        assert_eq!(state.visibility, Visibility::Hidden);
        // Cover axis still calculated, so the result counts as calculated
        assert!(state.calculated);
        assert!(!state.warnings.is_empty());
    }

    #[test]
    fn test_calculated_flags_are_per_axis() {
        let platform = Arc::new(MemoryPlatform::new());
        let integration = integration(&platform);
        let observer = medium("obs", 0.0, 0.0);
        let target = medium("tgt", 1000.0, 0.0);
        platform.fail_visibility_calc(true);

        let state =
            integration.get_combined_state(&observer, &target, CombinedStateOptions::default());
        // Visibility fell back, cover did not; each flag tracks its own axis
        assert!(!state.visibility_calculated);
        assert!(state.cover_calculated);
        assert!(state.calculated);
    }

    #[test]
    fn test_visibility_conservative_default() {
        let platform = Arc::new(MemoryPlatform::new());
        let integration = integration(&platform);
        let observer = medium("obs", 0.0, 0.0);
        let target = medium("tgt", 1000.0, 0.0);
        platform.fail_visibility_calc(true);

        let state =
            integration.get_combined_state(&observer, &target, CombinedStateOptions::default());
        assert_eq!(state.visibility, Visibility::Observed);
        assert!(state
            .warnings
            .iter()
            .any(|w| w.contains("defaulting to observed")));
    }

    #[test]
    fn test_stored_position_override_is_pure() {
        let platform = Arc::new(MemoryPlatform::new());
        platform.add_wall(WallSpec::solid(
            "w",
            Vec2::new(500.0, -1000.0),
            Vec2::new(500.0, 1000.0),
        ));
        let integration = integration(&platform);
        let observer = medium("obs", 0.0, 0.0);
        let target = medium("tgt", 400.0, 0.0);

        // Live position: same side of the wall, no cover
        let live =
            integration.get_combined_state(&observer, &target, CombinedStateOptions::default());
        assert_eq!(live.cover, CoverLevel::None);

        // Captured position behind the wall: cover, without touching the token
        let options = CombinedStateOptions {
            target_position: Some(Vec2::new(1000.0, 0.0)),
        };
        let stored = integration.get_combined_state(&observer, &target, options);
        assert!(stored.cover >= CoverLevel::Standard);
        assert_eq!(target.center, Vec2::new(400.0, 0.0));
    }

    #[test]
    fn test_batch_keyed_by_observer() {
        let platform = Arc::new(MemoryPlatform::new());
        let integration = integration(&platform);
        let target = medium("tgt", 1000.0, 0.0);
        let observers = vec![medium("o1", 0.0, 0.0), medium("o2", 0.0, 500.0)];

        let batch = integration.get_batch_combined_states(&target, &observers);
        assert_eq!(batch.len(), 2);
        assert!(batch.contains_key(&TokenId::new("o1")));
        assert!(batch.contains_key(&TokenId::new("o2")));
    }

    #[test]
    fn test_capture_position_state_fields() {
        let platform = Arc::new(MemoryPlatform::new());
        let integration = integration(&platform);
        let observer = medium("obs", 0.0, 0.0);
        let target = medium("tgt", 1000.0, 0.0);

        let state = integration.capture_position_state(
            &observer,
            &target,
            CombinedStateOptions::default(),
        );
        assert_eq!(state.visibility, Visibility::Observed);
        assert!((state.distance - 10.0).abs() < 1e-4);
        assert!(state.has_line_of_sight);
        assert!(state.timestamp_ms > 0);
        assert!(crate::position::validate_position_state(&state).is_valid);
    }
}
