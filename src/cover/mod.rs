//! Cover detection between two tokens
//!
//! Walls and intervening creatures each contribute a cover level; the
//! detector combines them and never lets an internal failure escape.

mod creatures;
mod walls;

pub use creatures::evaluate_creature_cover;
pub use walls::{does_wall_block_from_direction, estimate_wall_coverage_percent, evaluate_walls_cover};

use std::sync::Arc;

use crate::core::error::{Result, VantageError};
use crate::core::types::{CoverLevel, TokenRect};
use crate::platform::{SettingsSource, SpatialIndex, Token};

/// Computes the cover a target has against a source token
pub struct CoverDetector {
    index: Arc<dyn SpatialIndex>,
    settings: Arc<dyn SettingsSource>,
}

impl CoverDetector {
    pub fn new(index: Arc<dyn SpatialIndex>, settings: Arc<dyn SettingsSource>) -> Self {
        Self { index, settings }
    }

    /// Cover the target has against the source
    ///
    /// Never fails: malformed scene data degrades to `CoverLevel::None`
    /// and is logged.
    pub fn detect_between_tokens(&self, source: &Token, target: &Token) -> CoverLevel {
        match self.try_detect_between_tokens(source, target) {
            Ok(level) => level,
            Err(error) => {
                tracing::warn!(
                    source = %source.id,
                    target = %target.id,
                    %error,
                    "cover detection degraded to none"
                );
                CoverLevel::None
            }
        }
    }

    /// Is the straight line between the two centers free of blocking walls?
    pub fn has_line_of_sight(&self, source: &Token, target: &Token) -> bool {
        let region = query_region(source, target);
        let walls = self.index.walls_in(&region);
        !walls.iter().any(|wall| {
            does_wall_block_from_direction(Some(wall), source.center)
                && wall
                    .coords
                    .map(|(a, b)| {
                        crate::geometry::segments_intersect(source.center, target.center, a, b)
                    })
                    .unwrap_or(false)
        })
    }

    /// Fallible variant for callers that need to distinguish a computed
    /// `None` from a degraded one
    pub fn try_detect_between_tokens(&self, source: &Token, target: &Token) -> Result<CoverLevel> {
        if !source.rect.is_valid() {
            return Err(VantageError::CoverDetection(format!(
                "source token {} has a degenerate rect",
                source.id
            )));
        }
        if !target.rect.is_valid() {
            return Err(VantageError::CoverDetection(format!(
                "target token {} has a degenerate rect",
                target.id
            )));
        }

        let settings = self.settings.settings();
        settings
            .validate()
            .map_err(VantageError::InvalidConfig)?;

        let region = query_region(source, target);
        let walls = self.index.walls_in(&region);
        let wall_cover = evaluate_walls_cover(
            source.center,
            target.center,
            &target.rect,
            &walls,
            &settings,
        );

        // Walls alone cannot go higher; skip the creature pass at the top
        if wall_cover == CoverLevel::Greater {
            return Ok(wall_cover);
        }

        let blockers = self.index.tokens_in(&region);
        let creature_cover = evaluate_creature_cover(
            source,
            target,
            &blockers,
            settings.intersection_mode,
            settings.grid_size,
        );

        Ok(wall_cover.max(creature_cover))
    }
}

/// Bounding region of the pair, padded by a half grid square so walls and
/// blockers hugging either footprint are included
fn query_region(source: &Token, target: &Token) -> TokenRect {
    let pad = 50.0;
    TokenRect::new(
        source.rect.x1.min(target.rect.x1) - pad,
        source.rect.y1.min(target.rect.y1) - pad,
        source.rect.x2.max(target.rect.x2) + pad,
        source.rect.y2.max(target.rect.y2) + pad,
    )
}
