//! Intervening-creature cover under the selectable intersection modes

use ordered_float::OrderedFloat;

use crate::core::config::IntersectionMode;
use crate::core::types::{CoverLevel, SizeRank, TokenRect};
use crate::geometry::{chord_through_rect, projection_on_segment, segment_intersects_rect};
use crate::platform::Token;

/// Perpendicular distance tolerance for center mode, in grid units
const CENTER_LINE_TOLERANCE: f32 = 1.0;

/// Coverage-mode thresholds (percent of facing side covered)
const COVERAGE_GREATER_PCT: f32 = 70.0;
const COVERAGE_STANDARD_PCT: f32 = 50.0;

/// Tactical-mode thresholds (fraction of the 16 sight lines blocked)
const TACTICAL_GREATER_FRACTION: f32 = 0.75;
const TACTICAL_STANDARD_FRACTION: f32 = 0.5;

/// Tiny creatures get an effective box at this fraction of a grid cell so
/// the corner-line modes do not trivially ignore them
const TINY_EFFECTIVE_SCALE: f32 = 0.7;

/// Minimum chord length for length10 mode, as a fraction of blocker area
/// in grid squares
const LENGTH10_AREA_FRACTION: f32 = 0.1;

/// Cover a single blocker grants, by the size-comparison rule: standard
/// only when the blocker outsizes both attacker and target by at least two
/// steps, otherwise lesser.
fn size_rule_cover(blocker: &Token, attacker: &Token, target: &Token) -> CoverLevel {
    if blocker.size.steps_above(attacker.size) >= 2 && blocker.size.steps_above(target.size) >= 2 {
        CoverLevel::Standard
    } else {
        CoverLevel::Lesser
    }
}

/// Rect used for intersection tests: tiny creatures are inflated to a
/// fraction of a grid cell
fn effective_rect(token: &Token, grid_size: f32) -> TokenRect {
    if token.size == SizeRank::Tiny {
        let side = grid_size * TINY_EFFECTIVE_SCALE;
        TokenRect::centered(token.center, side, side)
    } else {
        token.rect
    }
}

/// Cover granted by intervening creatures between attacker and target
///
/// `blockers` must already exclude the attacker and target themselves.
/// The mode decides which blockers qualify and the level each contributes;
/// contributions aggregate by maximum.
pub fn evaluate_creature_cover(
    attacker: &Token,
    target: &Token,
    blockers: &[Token],
    mode: IntersectionMode,
    grid_size: f32,
) -> CoverLevel {
    let candidates: Vec<&Token> = blockers
        .iter()
        .filter(|b| b.id != attacker.id && b.id != target.id && b.rect.is_valid())
        .collect();

    if candidates.is_empty() {
        return CoverLevel::None;
    }

    match mode {
        IntersectionMode::Any => any_mode(attacker, target, &candidates),
        IntersectionMode::Center => center_mode(attacker, target, &candidates, grid_size),
        IntersectionMode::Coverage => coverage_mode(attacker, target, &candidates),
        IntersectionMode::Tactical => tactical_mode(attacker, target, &candidates, grid_size),
        IntersectionMode::Length10 => length10_mode(attacker, target, &candidates, grid_size),
    }
}

fn any_mode(attacker: &Token, target: &Token, candidates: &[&Token]) -> CoverLevel {
    let mut level = CoverLevel::None;
    for blocker in candidates {
        if segment_intersects_rect(attacker.center, target.center, &blocker.rect) {
            level = level.max(size_rule_cover(blocker, attacker, target));
        }
    }
    level
}

/// Nearest qualifying blocker wins; equal distances break by token id so
/// the result is deterministic.
fn center_mode(
    attacker: &Token,
    target: &Token,
    candidates: &[&Token],
    grid_size: f32,
) -> CoverLevel {
    let tolerance = CENTER_LINE_TOLERANCE * grid_size;

    let winner = candidates
        .iter()
        .filter_map(|blocker| {
            let t = projection_on_segment(blocker.center, attacker.center, target.center);
            // Must sit between the endpoints, not at them
            if t <= 0.0 || t >= 1.0 {
                return None;
            }
            let on_line = attacker.center + (target.center - attacker.center) * t;
            let distance = blocker.center.distance(on_line);
            (distance <= tolerance).then_some((*blocker, distance))
        })
        .min_by_key(|(blocker, distance)| (OrderedFloat(*distance), blocker.id.clone()));

    match winner {
        Some((blocker, _)) => size_rule_cover(blocker, attacker, target),
        None => CoverLevel::None,
    }
}

fn coverage_level(percent: f32) -> CoverLevel {
    if percent >= COVERAGE_GREATER_PCT {
        CoverLevel::Greater
    } else if percent >= COVERAGE_STANDARD_PCT {
        CoverLevel::Standard
    } else if percent > 0.0 {
        CoverLevel::Lesser
    } else {
        CoverLevel::None
    }
}

fn coverage_mode(attacker: &Token, target: &Token, candidates: &[&Token]) -> CoverLevel {
    let line = target.center - attacker.center;
    let mut level = CoverLevel::None;

    for blocker in candidates {
        let Some((entry, exit)) = chord_through_rect(attacker.center, target.center, &blocker.rect)
        else {
            continue;
        };
        let chord = entry.distance(exit);

        // Facing side: the rect dimension most perpendicular to the line's
        // dominant axis
        let facing = if line.x.abs() >= line.y.abs() {
            blocker.rect.height()
        } else {
            blocker.rect.width()
        };
        if facing <= 0.0 {
            continue;
        }

        let percent = ((chord / facing) * 100.0).min(100.0);
        level = level.max(coverage_level(percent));
        if level == CoverLevel::Greater {
            break;
        }
    }

    level
}

fn tactical_mode(
    attacker: &Token,
    target: &Token,
    candidates: &[&Token],
    grid_size: f32,
) -> CoverLevel {
    let attacker_corners = effective_rect(attacker, grid_size).corners();
    let target_corners = effective_rect(target, grid_size).corners();

    let mut blocked = 0u32;
    let mut total = 0u32;
    for from in attacker_corners {
        for to in target_corners {
            total += 1;
            let is_blocked = candidates.iter().any(|blocker| {
                let rect = effective_rect(blocker, grid_size);
                segment_intersects_rect(from, to, &rect)
            });
            if is_blocked {
                blocked += 1;
            }
        }
    }

    if total == 0 {
        return CoverLevel::None;
    }
    let fraction = blocked as f32 / total as f32;

    if fraction >= TACTICAL_GREATER_FRACTION {
        CoverLevel::Greater
    } else if fraction >= TACTICAL_STANDARD_FRACTION {
        CoverLevel::Standard
    } else if fraction > 0.0 {
        CoverLevel::Lesser
    } else {
        CoverLevel::None
    }
}

/// A blocker counts only when the chord across it covers at least 10% of
/// its footprint area measured in grid squares.
fn length10_mode(
    attacker: &Token,
    target: &Token,
    candidates: &[&Token],
    grid_size: f32,
) -> CoverLevel {
    let mut level = CoverLevel::None;

    for blocker in candidates {
        let Some((entry, exit)) = chord_through_rect(attacker.center, target.center, &blocker.rect)
        else {
            continue;
        };
        let chord_grid = entry.distance(exit) / grid_size;
        let area_grid =
            (blocker.rect.width() / grid_size) * (blocker.rect.height() / grid_size);

        if chord_grid >= LENGTH10_AREA_FRACTION * area_grid {
            level = level.max(size_rule_cover(blocker, attacker, target));
        }
    }

    level
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Alliance, TokenId};
    use glam::Vec2;

    const GRID: f32 = 100.0;

    fn token(id: &str, x: f32, y: f32, size: SizeRank) -> Token {
        let squares = match size {
            SizeRank::Tiny | SizeRank::Small | SizeRank::Medium => 1.0,
            SizeRank::Large => 2.0,
            SizeRank::Huge => 3.0,
            SizeRank::Gargantuan => 4.0,
        };
        let side = squares * GRID;
        Token {
            id: TokenId::new(id),
            center: Vec2::new(x, y),
            rect: TokenRect::centered(Vec2::new(x, y), side, side),
            size,
            alliance: Alliance::Neutral,
        }
    }

    fn medium(id: &str, x: f32, y: f32) -> Token {
        token(id, x, y, SizeRank::Medium)
    }

    #[test]
    fn test_no_blockers_no_cover() {
        let a = medium("a", 0.0, 0.0);
        let t = medium("t", 1000.0, 0.0);
        for mode in [
            IntersectionMode::Any,
            IntersectionMode::Center,
            IntersectionMode::Coverage,
            IntersectionMode::Tactical,
            IntersectionMode::Length10,
        ] {
            assert_eq!(
                evaluate_creature_cover(&a, &t, &[], mode, GRID),
                CoverLevel::None
            );
        }
    }

    #[test]
    fn test_any_mode_medium_blocker_gives_lesser() {
        let a = medium("a", 0.0, 0.0);
        let t = medium("t", 1000.0, 0.0);
        let blocker = medium("b", 500.0, 0.0);
        let level =
            evaluate_creature_cover(&a, &t, &[blocker], IntersectionMode::Any, GRID);
        assert_eq!(level, CoverLevel::Lesser);
    }

    #[test]
    fn test_any_mode_huge_blocker_gives_standard() {
        let a = medium("a", 0.0, 0.0);
        let t = medium("t", 1000.0, 0.0);
        let blocker = token("b", 500.0, 0.0, SizeRank::Huge);
        let level =
            evaluate_creature_cover(&a, &t, &[blocker], IntersectionMode::Any, GRID);
        assert_eq!(level, CoverLevel::Standard);
    }

    #[test]
    fn test_any_mode_huge_blocker_against_large_target_gives_lesser() {
        // Two steps above medium attacker but not above the large target
        let a = medium("a", 0.0, 0.0);
        let t = token("t", 1000.0, 0.0, SizeRank::Large);
        let blocker = token("b", 500.0, 0.0, SizeRank::Huge);
        let level =
            evaluate_creature_cover(&a, &t, &[blocker], IntersectionMode::Any, GRID);
        assert_eq!(level, CoverLevel::Lesser);
    }

    #[test]
    fn test_any_mode_ignores_attacker_and_target() {
        let a = medium("a", 0.0, 0.0);
        let t = medium("t", 1000.0, 0.0);
        let level = evaluate_creature_cover(
            &a,
            &t,
            &[a.clone(), t.clone()],
            IntersectionMode::Any,
            GRID,
        );
        assert_eq!(level, CoverLevel::None);
    }

    #[test]
    fn test_center_mode_requires_proximity_to_line() {
        let a = medium("a", 0.0, 0.0);
        let t = medium("t", 1000.0, 0.0);
        // Slightly off the line, within one grid unit
        let near = medium("near", 500.0, 60.0);
        let level =
            evaluate_creature_cover(&a, &t, &[near], IntersectionMode::Center, GRID);
        assert_eq!(level, CoverLevel::Lesser);

        // Outside the tolerance band
        let far = medium("far", 500.0, 150.0);
        let level = evaluate_creature_cover(&a, &t, &[far], IntersectionMode::Center, GRID);
        assert_eq!(level, CoverLevel::None);
    }

    #[test]
    fn test_center_mode_rejects_blocker_past_endpoints() {
        let a = medium("a", 0.0, 0.0);
        let t = medium("t", 1000.0, 0.0);
        let behind = medium("behind", 1200.0, 0.0);
        let level =
            evaluate_creature_cover(&a, &t, &[behind], IntersectionMode::Center, GRID);
        assert_eq!(level, CoverLevel::None);
    }

    #[test]
    fn test_center_mode_nearest_wins_with_deterministic_tie_break() {
        let t = token("t", 1000.0, 0.0, SizeRank::Tiny);
        // Same perpendicular distance, different ids; the rule picks the
        // lower id, and that blocker's size decides the level
        let tie_low = token("m1", 400.0, 50.0, SizeRank::Huge);
        let tie_high = token("m2", 600.0, 50.0, SizeRank::Medium);
        let attacker = token("a2", 0.0, 0.0, SizeRank::Tiny);
        let level = evaluate_creature_cover(
            &attacker,
            &t,
            &[tie_high, tie_low],
            IntersectionMode::Center,
            GRID,
        );
        // m1 (huge) wins the tie against tiny attacker/target: standard
        assert_eq!(level, CoverLevel::Standard);
    }

    #[test]
    fn test_coverage_mode_levels() {
        let a = medium("a", 0.0, 0.0);
        let t = medium("t", 1000.0, 0.0);

        // Line passes straight through a medium blocker: chord 100 across
        // facing side 100 = 100% coverage
        let full = medium("b", 500.0, 0.0);
        let level =
            evaluate_creature_cover(&a, &t, &[full], IntersectionMode::Coverage, GRID);
        assert_eq!(level, CoverLevel::Greater);

        // Diagonal line clips a corner: short chord, lesser
        let a = medium("a", 0.0, 0.0);
        let t = medium("t", 1000.0, 1000.0);
        let clip = medium("c", 500.0, 420.0);
        let level =
            evaluate_creature_cover(&a, &t, &[clip], IntersectionMode::Coverage, GRID);
        assert_eq!(level, CoverLevel::Lesser);
    }

    #[test]
    fn test_coverage_mode_aggregates_max() {
        let a = medium("a", 0.0, 0.0);
        let t = medium("t", 1000.0, 1000.0);
        let clip = medium("c", 300.0, 220.0);
        let full = medium("b", 500.0, 500.0);
        let level = evaluate_creature_cover(
            &a,
            &t,
            &[clip, full],
            IntersectionMode::Coverage,
            GRID,
        );
        assert_eq!(level, CoverLevel::Greater);
    }

    #[test]
    fn test_tactical_mode_wide_blocker() {
        let a = medium("a", 0.0, 0.0);
        let t = medium("t", 1000.0, 0.0);
        // Gargantuan blocker square across the middle blocks every line
        let big = token("b", 500.0, 0.0, SizeRank::Gargantuan);
        let level =
            evaluate_creature_cover(&a, &t, &[big], IntersectionMode::Tactical, GRID);
        assert_eq!(level, CoverLevel::Greater);
    }

    #[test]
    fn test_tactical_mode_partial_blocker() {
        let a = medium("a", 0.0, 0.0);
        let t = medium("t", 1000.0, 0.0);
        // Offset blocker only interrupts some of the 16 lines
        let offset = medium("b", 500.0, 80.0);
        let level =
            evaluate_creature_cover(&a, &t, &[offset], IntersectionMode::Tactical, GRID);
        assert!(level == CoverLevel::Lesser || level == CoverLevel::Standard);
    }

    #[test]
    fn test_tactical_mode_tiny_blocker_not_ignored() {
        let a = medium("a", 0.0, 0.0);
        let t = medium("t", 1000.0, 0.0);
        // Dead-center tiny blocker still gets an effective box
        let tiny = token("b", 500.0, 0.0, SizeRank::Tiny);
        let level =
            evaluate_creature_cover(&a, &t, &[tiny], IntersectionMode::Tactical, GRID);
        assert!(level > CoverLevel::None);
    }

    #[test]
    fn test_length10_mode_thresholds() {
        // Straight-through chord of a 1x1 blocker: 1.0 grid units >= 0.1
        let a = medium("a", 0.0, 0.0);
        let t = medium("t", 1000.0, 0.0);
        let through = medium("b", 500.0, 0.0);
        let level =
            evaluate_creature_cover(&a, &t, &[through], IntersectionMode::Length10, GRID);
        assert_eq!(level, CoverLevel::Lesser);

        // Diagonal sight line clipping only a corner of the blocker:
        // chord ~0.07 grid units, below the 10%-of-area bar
        let a = medium("a", 0.0, 0.0);
        let t = medium("t", 1000.0, 1000.0);
        let graze = medium("c", 500.0, 405.0);
        let level =
            evaluate_creature_cover(&a, &t, &[graze], IntersectionMode::Length10, GRID);
        assert_eq!(level, CoverLevel::None);
    }
}
