//! Engine settings with documented values
//!
//! All tunables are collected here with explanations of their purpose.
//! The host platform supplies live values through `platform::SettingsSource`;
//! the defaults below match out-of-the-box behavior.

use serde::{Deserialize, Serialize};

/// Algorithm used to decide whether an intervening creature grants cover
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntersectionMode {
    /// Any edge intersection with the blocker's rect counts; cover level
    /// comes from the size-comparison rule.
    #[default]
    Any,
    /// Only a blocker whose rect center sits within one grid unit of the
    /// line (and between its endpoints) counts; nearest wins.
    Center,
    /// Percentage of the blocker's facing side covered by the line's
    /// intersection span decides the level.
    Coverage,
    /// All 16 corner-to-corner sight lines between the two boxes are cast;
    /// the blocked fraction decides the level.
    Tactical,
    /// A blocker counts only when the intersection chord covers at least
    /// 10% of its area in grid squares.
    Length10,
}

/// Settings for the visibility/cover engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    // === WALL COVER ===
    /// Coverage percentage at which wall cover reaches standard
    ///
    /// Percentage of sampled rays from the attacker to the target's rect
    /// that must be blocked. Any blocking wall already floors the result
    /// at standard on the wall path; this threshold matters for tuning
    /// relative to `wall_cover_greater_threshold`.
    pub wall_cover_standard_threshold: f32,

    /// Coverage percentage at which wall cover reaches greater
    pub wall_cover_greater_threshold: f32,

    /// Whether walls may grant greater cover at all
    ///
    /// When false, wall cover is capped at standard regardless of coverage.
    pub wall_cover_allow_greater: bool,

    // === CREATURE COVER ===
    /// Algorithm for intervening-creature cover
    pub intersection_mode: IntersectionMode,

    // === OBSERVERS ===
    /// Skip allies of the sneaking token when capturing observers
    pub ignore_allies: bool,

    // === SUBSYSTEMS ===
    /// Whether the automatic cover subsystem accepts writes
    ///
    /// When disabled, the applier skips cover changes with a warning and a
    /// transaction may still succeed on visibility alone.
    pub cover_system_enabled: bool,

    // === NOTIFICATIONS ===
    /// Whether fallback events may notify the user at all
    pub notify_on_fallback: bool,

    /// Maximum user-facing notifications per session
    pub max_notifications_per_session: u32,

    /// Maximum automatic recovery attempts per subsystem
    ///
    /// A bounded counter, not a time window. Once reached, further
    /// recovery is skipped and only logged.
    pub max_recovery_attempts: u32,

    // === SCENE ===
    /// Scene grid size in pixels per square
    pub grid_size: f32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            // Wall cover
            wall_cover_standard_threshold: 50.0,
            wall_cover_greater_threshold: 70.0,
            wall_cover_allow_greater: true,

            // Creature cover
            intersection_mode: IntersectionMode::Any,

            // Observers
            ignore_allies: true,

            // Subsystems
            cover_system_enabled: true,

            // Notifications
            notify_on_fallback: true,
            max_notifications_per_session: 3,
            max_recovery_attempts: 3,

            // Scene
            grid_size: 100.0,
        }
    }
}

impl EngineSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings for internal consistency
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=100.0).contains(&self.wall_cover_standard_threshold) {
            return Err(format!(
                "wall_cover_standard_threshold ({}) must be within 0-100",
                self.wall_cover_standard_threshold
            ));
        }

        if !(0.0..=100.0).contains(&self.wall_cover_greater_threshold) {
            return Err(format!(
                "wall_cover_greater_threshold ({}) must be within 0-100",
                self.wall_cover_greater_threshold
            ));
        }

        // Thresholds should be ordered
        if self.wall_cover_standard_threshold > self.wall_cover_greater_threshold {
            return Err(format!(
                "wall_cover_standard_threshold ({}) should be <= wall_cover_greater_threshold ({})",
                self.wall_cover_standard_threshold, self.wall_cover_greater_threshold
            ));
        }

        if self.grid_size <= 0.0 || !self.grid_size.is_finite() {
            return Err(format!("grid_size ({}) must be positive", self.grid_size));
        }

        Ok(())
    }
}
