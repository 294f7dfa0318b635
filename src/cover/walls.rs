//! Wall occluder rules: directionality, doors, coverage sampling, overrides

use glam::Vec2;

use crate::core::config::EngineSettings;
use crate::core::types::{CoverLevel, TokenRect};
use crate::geometry::{rect_sample_points, segments_intersect};
use crate::platform::{DoorKind, DoorState, WallDirection, WallSpec};

/// Does this wall block sight from the attacker's position?
///
/// `None` means the wall document itself is unusable and is treated as
/// blocking; a wall whose geometry is merely missing fails open for the
/// directional check. The asymmetry matches observed platform behavior
/// and is preserved on purpose.
pub fn does_wall_block_from_direction(wall: Option<&WallSpec>, attacker: Vec2) -> bool {
    let Some(wall) = wall else {
        return true;
    };

    if wall.sight == 0 {
        return false;
    }

    // Door state wins over directionality
    if wall.door != DoorKind::NotADoor {
        return wall.door_state != DoorState::Open;
    }

    let Some(dir) = wall.dir else {
        return true;
    };

    let Some((start, end)) = wall.coords else {
        return false;
    };
    if !start.is_finite() || !end.is_finite() || !attacker.is_finite() {
        return false;
    }

    let wall_vec = end - start;
    let to_attacker = attacker - start;
    let cross = wall_vec.x * to_attacker.y - wall_vec.y * to_attacker.x;

    match dir {
        WallDirection::Left => cross > 0.0,
        WallDirection::Right => cross < 0.0,
    }
}

/// Does the wall's segment cross the ray from `from` to `to`?
fn wall_crosses(wall: &WallSpec, from: Vec2, to: Vec2) -> bool {
    match wall.coords {
        Some((a, b)) => segments_intersect(from, to, a, b),
        None => false,
    }
}

/// Percentage of the target rect hidden from the attacker by walls
///
/// Samples the rect uniformly (corners, edges, center) and casts a ray from
/// the attacker to each sample. No sample is weighted above another.
/// Returns 0 on a degenerate rect.
pub fn estimate_wall_coverage_percent(
    attacker: Vec2,
    target_rect: &TokenRect,
    walls: &[WallSpec],
) -> f32 {
    if !target_rect.is_valid() || !attacker.is_finite() {
        return 0.0;
    }

    let samples = rect_sample_points(target_rect);
    let total = samples.len();
    if total == 0 {
        return 0.0;
    }

    let blocked = samples
        .iter()
        .filter(|sample| {
            walls.iter().any(|wall| {
                does_wall_block_from_direction(Some(wall), attacker)
                    && wall_crosses(wall, attacker, **sample)
            })
        })
        .count();

    (blocked as f32 / total as f32) * 100.0
}

/// Cover granted to the target by walls alone
///
/// Any wall that blocks from the attacker's side and crosses the
/// attacker-target line floors the result at standard; the coverage
/// percentage decides the standard/greater boundary. Per-wall overrides
/// cap the result (an override of none forces none).
pub fn evaluate_walls_cover(
    attacker: Vec2,
    target_center: Vec2,
    target_rect: &TokenRect,
    walls: &[WallSpec],
    settings: &EngineSettings,
) -> CoverLevel {
    let blocking: Vec<&WallSpec> = walls
        .iter()
        .filter(|wall| {
            does_wall_block_from_direction(Some(wall), attacker)
                && wall_crosses(wall, attacker, target_center)
        })
        .collect();

    if blocking.is_empty() {
        return CoverLevel::None;
    }

    let percent = estimate_wall_coverage_percent(attacker, target_rect, walls);

    let mut level = if percent >= settings.wall_cover_greater_threshold
        && settings.wall_cover_allow_greater
    {
        CoverLevel::Greater
    } else {
        CoverLevel::Standard
    };

    // Overrides are ceilings, applied only for walls oriented against us
    for wall in blocking {
        if let Some(ceiling) = wall.cover_override {
            level = level.min(ceiling);
        }
    }

    level
}
