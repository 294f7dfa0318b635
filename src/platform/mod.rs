//! Collaborator seams to the host virtual-tabletop platform
//!
//! The engine owns no documents, settings storage, or UI. Everything it
//! needs from the platform comes through the traits below, bound at
//! composition time. `platform::memory` provides an in-memory binding used
//! by the test suites.

pub mod memory;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::core::config::EngineSettings;
use crate::core::error::Result;
use crate::core::types::{
    Alliance, CoverLevel, SizeRank, TimestampMs, TokenId, TokenRect, Visibility, WallId,
};

/// A token as the engine sees it: footprint, position, and the traits the
/// cover/visibility rules need. Constructed at the boundary from the host
/// platform's token document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub center: Vec2,
    pub rect: TokenRect,
    pub size: SizeRank,
    pub alliance: Alliance,
}

impl Token {
    /// Copy of this token relocated to a different center, footprint moved
    /// with it. Used for stored-position recomputation without touching the
    /// live document.
    pub fn at_position(&self, center: Vec2) -> Self {
        let mut moved = self.clone();
        let delta = center - self.center;
        moved.center = center;
        moved.rect = TokenRect::new(
            self.rect.x1 + delta.x,
            self.rect.y1 + delta.y,
            self.rect.x2 + delta.x,
            self.rect.y2 + delta.y,
        );
        moved
    }
}

/// Which side of a directional wall blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WallDirection {
    Left,
    Right,
}

/// Door classification of a wall document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorKind {
    #[default]
    NotADoor,
    Door,
    Secret,
}

/// Open/closed state of a door wall
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorState {
    #[default]
    Closed,
    Open,
    Locked,
}

/// Wall document shape, typed at the boundary instead of duck-typed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallSpec {
    pub id: WallId,
    /// Sight-blocking flag: 0 means the wall never blocks sight
    pub sight: u8,
    /// Directional restriction; absent blocks from both sides
    pub dir: Option<WallDirection>,
    pub door: DoorKind,
    pub door_state: DoorState,
    /// Endpoints in scene pixels; absent/non-finite means the document
    /// carries no usable geometry
    pub coords: Option<(Vec2, Vec2)>,
    /// Explicit per-wall cover ceiling, applied only when the wall blocks
    /// from the attacker's side
    pub cover_override: Option<CoverLevel>,
}

impl WallSpec {
    /// Plain sight-blocking wall between two points
    pub fn solid(id: impl Into<String>, a: Vec2, b: Vec2) -> Self {
        Self {
            id: WallId::new(id),
            sight: 1,
            dir: None,
            door: DoorKind::NotADoor,
            door_state: DoorState::Closed,
            coords: Some((a, b)),
            cover_override: None,
        }
    }
}

/// One requested visibility write: how `observer` perceives `target`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityChange {
    pub observer: TokenId,
    pub target: TokenId,
    pub new_visibility: Visibility,
}

/// One requested cover write: cover `target` has against `observer`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverChange {
    pub observer: TokenId,
    pub target: TokenId,
    pub new_cover: CoverLevel,
}

/// Per-item result of a batched write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOutcome {
    pub observer: TokenId,
    pub target: TokenId,
    pub ok: bool,
    pub message: Option<String>,
}

/// Severity of a user-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyLevel {
    Info,
    Warn,
    Error,
}

/// Token/actor document access
pub trait TokenStore {
    fn token(&self, id: &TokenId) -> Option<Token>;

    /// Set or clear the transient "is sneaking" marker on the actor
    fn set_sneaking(&self, id: &TokenId, active: bool) -> Result<()>;

    fn is_sneaking(&self, id: &TokenId) -> bool;

    /// Already-persisted per-pair visibility, the tier-2 fallback source
    fn stored_visibility(&self, observer: &TokenId, target: &TokenId) -> Option<Visibility>;

    /// Already-persisted per-pair cover, the tier-2 fallback source
    fn stored_cover(&self, observer: &TokenId, target: &TokenId) -> Option<CoverLevel>;
}

/// Primary external visibility engine; may fail
pub trait VisibilityCalculator {
    fn calculate_visibility(&self, observer: &Token, target: &Token) -> Result<Visibility>;
}

/// Batch writer for the visibility subsystem
pub trait VisibilityWriter {
    fn apply_visibility_batch(&self, changes: &[VisibilityChange]) -> Result<Vec<WriteOutcome>>;
}

/// Batch writer for the cover subsystem
pub trait CoverWriter {
    fn apply_cover_batch(&self, changes: &[CoverChange]) -> Result<Vec<WriteOutcome>>;
}

/// Live settings reads
pub trait SettingsSource {
    fn settings(&self) -> EngineSettings;
}

/// Scene spatial queries
pub trait SpatialIndex {
    /// Wall documents whose segment touches the region
    fn walls_in(&self, region: &TokenRect) -> Vec<WallSpec>;

    /// Tokens whose rect touches the region
    fn tokens_in(&self, region: &TokenRect) -> Vec<Token>;
}

/// User-facing message sink
pub trait NotificationSink {
    fn notify(&self, level: NotifyLevel, message: &str);
}

/// Token movement detection between captures
pub trait MovementTracker {
    fn has_moved_since(&self, token: &TokenId, since: TimestampMs) -> bool;
}
