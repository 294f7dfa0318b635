//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};

/// Unique identifier for tokens (observer, target, or blocker)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId(pub String);

impl TokenId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for wall documents
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WallId(pub String);

impl WallId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Identifier for one sneak session (usually the triggering message id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Milliseconds since the Unix epoch
pub type TimestampMs = u64;

/// Current wall-clock time in milliseconds
pub fn now_ms() -> TimestampMs {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(1)
}

/// Cover level granted to a target against one attacker
///
/// Ordinal: each level grants a larger defensive bonus than the last.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CoverLevel {
    #[default]
    None = 0,
    Lesser = 1,
    Standard = 2,
    Greater = 3,
}

impl CoverLevel {
    /// Stealth bonus granted by this cover level
    pub fn stealth_bonus(self) -> u8 {
        match self {
            CoverLevel::None => 0,
            CoverLevel::Lesser => 1,
            CoverLevel::Standard => 2,
            CoverLevel::Greater => 4,
        }
    }
}

impl std::fmt::Display for CoverLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CoverLevel::None => "none",
            CoverLevel::Lesser => "lesser",
            CoverLevel::Standard => "standard",
            CoverLevel::Greater => "greater",
        };
        write!(f, "{s}")
    }
}

/// Concealment ladder: how well a target is perceived by one observer
///
/// Ordinal: later variants are *more* concealed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Visibility {
    #[default]
    Observed = 0,
    Concealed = 1,
    Hidden = 2,
    Undetected = 3,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Visibility::Observed => "observed",
            Visibility::Concealed => "concealed",
            Visibility::Hidden => "hidden",
            Visibility::Undetected => "undetected",
        };
        write!(f, "{s}")
    }
}

/// Lighting at the target's position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lighting {
    Bright,
    Dim,
    Darkness,
    #[default]
    Unknown,
}

/// Creature size rank on the ordinal scale used for blocker comparisons
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SizeRank {
    Tiny = 0,
    Small = 1,
    #[default]
    Medium = 2,
    Large = 3,
    Huge = 4,
    Gargantuan = 5,
}

impl SizeRank {
    /// Number of size steps this rank exceeds the other by (0 if not larger)
    pub fn steps_above(self, other: SizeRank) -> u8 {
        (self as u8).saturating_sub(other as u8)
    }
}

/// Axis-aligned bounding rectangle of a token footprint, in scene pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenRect {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl TokenRect {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Rect of the given width/height centered on a point
    pub fn centered(center: glam::Vec2, width: f32, height: f32) -> Self {
        Self {
            x1: center.x - width / 2.0,
            y1: center.y - height / 2.0,
            x2: center.x + width / 2.0,
            y2: center.y + height / 2.0,
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn center(&self) -> glam::Vec2 {
        glam::Vec2::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn corners(&self) -> [glam::Vec2; 4] {
        [
            glam::Vec2::new(self.x1, self.y1),
            glam::Vec2::new(self.x2, self.y1),
            glam::Vec2::new(self.x2, self.y2),
            glam::Vec2::new(self.x1, self.y2),
        ]
    }

    /// True when the rect has positive area and finite coordinates
    pub fn is_valid(&self) -> bool {
        self.x1.is_finite()
            && self.y1.is_finite()
            && self.x2.is_finite()
            && self.y2.is_finite()
            && self.x2 > self.x1
            && self.y2 > self.y1
    }
}

/// Side a token fights for, used by the ally-exclusion filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alliance {
    Party,
    Opposition,
    #[default]
    Neutral,
}
