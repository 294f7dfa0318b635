//! In-memory platform binding
//!
//! Backs the test suites with a constructed scene: tokens, walls, stored
//! per-pair states, and togglable failure injection for the external
//! calculator and writers.

use std::sync::Mutex;

use ahash::{AHashMap, AHashSet};
use glam::Vec2;

use crate::core::config::EngineSettings;
use crate::core::error::{Result, VantageError};
use crate::core::types::{CoverLevel, TimestampMs, TokenId, TokenRect, Visibility};
use crate::platform::{
    CoverChange, CoverWriter, MovementTracker, NotificationSink, NotifyLevel, SettingsSource,
    SpatialIndex, Token, TokenStore, VisibilityCalculator, VisibilityChange, VisibilityWriter,
    WallSpec, WriteOutcome,
};

#[derive(Default)]
struct Scene {
    tokens: AHashMap<TokenId, Token>,
    walls: Vec<WallSpec>,
    sneaking: AHashSet<TokenId>,
    visibility: AHashMap<(TokenId, TokenId), Visibility>,
    cover: AHashMap<(TokenId, TokenId), CoverLevel>,
    moved: AHashSet<TokenId>,
    notifications: Vec<(NotifyLevel, String)>,
}

/// Failure switches for exercising fallback and rollback paths
#[derive(Default)]
struct Faults {
    visibility_calc: bool,
    visibility_write: bool,
    cover_write: bool,
}

/// One object implementing every platform trait over in-memory state
pub struct MemoryPlatform {
    scene: Mutex<Scene>,
    faults: Mutex<Faults>,
    settings: Mutex<EngineSettings>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self {
            scene: Mutex::new(Scene::default()),
            faults: Mutex::new(Faults::default()),
            settings: Mutex::new(EngineSettings::default()),
        }
    }

    pub fn add_token(&self, token: Token) {
        self.scene
            .lock()
            .unwrap()
            .tokens
            .insert(token.id.clone(), token);
    }

    pub fn add_wall(&self, wall: WallSpec) {
        self.scene.lock().unwrap().walls.push(wall);
    }

    pub fn set_settings(&self, settings: EngineSettings) {
        *self.settings.lock().unwrap() = settings;
    }

    pub fn set_stored_visibility(&self, observer: &TokenId, target: &TokenId, vis: Visibility) {
        self.scene
            .lock()
            .unwrap()
            .visibility
            .insert((observer.clone(), target.clone()), vis);
    }

    pub fn set_stored_cover(&self, observer: &TokenId, target: &TokenId, cover: CoverLevel) {
        self.scene
            .lock()
            .unwrap()
            .cover
            .insert((observer.clone(), target.clone()), cover);
    }

    /// Move a token and mark it as having moved
    pub fn move_token(&self, id: &TokenId, center: Vec2) {
        let mut scene = self.scene.lock().unwrap();
        if let Some(token) = scene.tokens.get(id) {
            let moved = token.at_position(center);
            scene.tokens.insert(id.clone(), moved);
        }
        scene.moved.insert(id.clone());
    }

    pub fn fail_visibility_calc(&self, fail: bool) {
        self.faults.lock().unwrap().visibility_calc = fail;
    }

    pub fn fail_visibility_write(&self, fail: bool) {
        self.faults.lock().unwrap().visibility_write = fail;
    }

    pub fn fail_cover_write(&self, fail: bool) {
        self.faults.lock().unwrap().cover_write = fail;
    }

    pub fn notifications(&self) -> Vec<(NotifyLevel, String)> {
        self.scene.lock().unwrap().notifications.clone()
    }
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for MemoryPlatform {
    fn token(&self, id: &TokenId) -> Option<Token> {
        self.scene.lock().unwrap().tokens.get(id).cloned()
    }

    fn set_sneaking(&self, id: &TokenId, active: bool) -> Result<()> {
        let mut scene = self.scene.lock().unwrap();
        if active {
            scene.sneaking.insert(id.clone());
        } else {
            scene.sneaking.remove(id);
        }
        Ok(())
    }

    fn is_sneaking(&self, id: &TokenId) -> bool {
        self.scene.lock().unwrap().sneaking.contains(id)
    }

    fn stored_visibility(&self, observer: &TokenId, target: &TokenId) -> Option<Visibility> {
        self.scene
            .lock()
            .unwrap()
            .visibility
            .get(&(observer.clone(), target.clone()))
            .copied()
    }

    fn stored_cover(&self, observer: &TokenId, target: &TokenId) -> Option<CoverLevel> {
        self.scene
            .lock()
            .unwrap()
            .cover
            .get(&(observer.clone(), target.clone()))
            .copied()
    }
}

impl VisibilityCalculator for MemoryPlatform {
    fn calculate_visibility(&self, observer: &Token, target: &Token) -> Result<Visibility> {
        if self.faults.lock().unwrap().visibility_calc {
            return Err(VantageError::VisibilityCalculation(
                "calculator unavailable".into(),
            ));
        }
        // Fall back to the stored pair value, else observed
        Ok(self
            .stored_visibility(&observer.id, &target.id)
            .unwrap_or(Visibility::Observed))
    }
}

impl VisibilityWriter for MemoryPlatform {
    fn apply_visibility_batch(&self, changes: &[VisibilityChange]) -> Result<Vec<WriteOutcome>> {
        if self.faults.lock().unwrap().visibility_write {
            return Err(VantageError::WriteFailed("visibility writer down".into()));
        }
        let mut scene = self.scene.lock().unwrap();
        Ok(changes
            .iter()
            .map(|change| {
                scene.visibility.insert(
                    (change.observer.clone(), change.target.clone()),
                    change.new_visibility,
                );
                WriteOutcome {
                    observer: change.observer.clone(),
                    target: change.target.clone(),
                    ok: true,
                    message: None,
                }
            })
            .collect())
    }
}

impl CoverWriter for MemoryPlatform {
    fn apply_cover_batch(&self, changes: &[CoverChange]) -> Result<Vec<WriteOutcome>> {
        if self.faults.lock().unwrap().cover_write {
            return Err(VantageError::WriteFailed("cover writer down".into()));
        }
        let mut scene = self.scene.lock().unwrap();
        Ok(changes
            .iter()
            .map(|change| {
                scene.cover.insert(
                    (change.observer.clone(), change.target.clone()),
                    change.new_cover,
                );
                WriteOutcome {
                    observer: change.observer.clone(),
                    target: change.target.clone(),
                    ok: true,
                    message: None,
                }
            })
            .collect())
    }
}

impl SettingsSource for MemoryPlatform {
    fn settings(&self) -> EngineSettings {
        self.settings.lock().unwrap().clone()
    }
}

impl SpatialIndex for MemoryPlatform {
    fn walls_in(&self, region: &TokenRect) -> Vec<WallSpec> {
        self.scene
            .lock()
            .unwrap()
            .walls
            .iter()
            .filter(|wall| match wall.coords {
                Some((a, b)) => {
                    let min_x = a.x.min(b.x);
                    let max_x = a.x.max(b.x);
                    let min_y = a.y.min(b.y);
                    let max_y = a.y.max(b.y);
                    max_x >= region.x1
                        && min_x <= region.x2
                        && max_y >= region.y1
                        && min_y <= region.y2
                }
                // Walls without geometry still surface; the detector
                // decides how to treat them
                None => true,
            })
            .cloned()
            .collect()
    }

    fn tokens_in(&self, region: &TokenRect) -> Vec<Token> {
        self.scene
            .lock()
            .unwrap()
            .tokens
            .values()
            .filter(|token| {
                token.rect.x2 >= region.x1
                    && token.rect.x1 <= region.x2
                    && token.rect.y2 >= region.y1
                    && token.rect.y1 <= region.y2
            })
            .cloned()
            .collect()
    }
}

impl NotificationSink for MemoryPlatform {
    fn notify(&self, level: NotifyLevel, message: &str) {
        self.scene
            .lock()
            .unwrap()
            .notifications
            .push((level, message.to_string()));
    }
}

impl MovementTracker for MemoryPlatform {
    fn has_moved_since(&self, token: &TokenId, _since: TimestampMs) -> bool {
        self.scene.lock().unwrap().moved.contains(token)
    }
}
