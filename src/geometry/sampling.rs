//! Rectangle sampling and segment/rect clipping

use glam::Vec2;

use crate::core::types::TokenRect;
use crate::geometry::primitives::segments_intersect;

/// Interior edge sample parameters (four per edge, corners excluded)
const EDGE_STEPS: [f32; 4] = [0.2, 0.4, 0.6, 0.8];

/// Sample points of a token rect: 4 corners, 4 interior points per edge,
/// and the center — 21 points total, all weighted equally.
pub fn rect_sample_points(rect: &TokenRect) -> Vec<Vec2> {
    let corners = rect.corners();
    let mut points = Vec::with_capacity(21);
    points.extend_from_slice(&corners);

    for i in 0..4 {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        for t in EDGE_STEPS {
            points.push(a + (b - a) * t);
        }
    }

    points.push(rect.center());
    points
}

/// Does segment p1-p2 cross any edge of the rect?
pub fn segment_intersects_rect(p1: Vec2, p2: Vec2, rect: &TokenRect) -> bool {
    let corners = rect.corners();
    (0..4).any(|i| segments_intersect(p1, p2, corners[i], corners[(i + 1) % 4]))
}

/// Clip segment p1-p2 against the rect (Liang-Barsky), returning the
/// entry and exit points of the chord inside it, or `None` when the
/// segment misses the rect entirely.
pub fn chord_through_rect(p1: Vec2, p2: Vec2, rect: &TokenRect) -> Option<(Vec2, Vec2)> {
    let d = p2 - p1;
    let mut t0: f32 = 0.0;
    let mut t1: f32 = 1.0;

    let checks = [
        (-d.x, p1.x - rect.x1),
        (d.x, rect.x2 - p1.x),
        (-d.y, p1.y - rect.y1),
        (d.y, rect.y2 - p1.y),
    ];

    for (p, q) in checks {
        if p == 0.0 {
            // Parallel to this boundary; outside means no chord
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            if r > t0 {
                t0 = r;
            }
        } else {
            if r < t0 {
                return None;
            }
            if r < t1 {
                t1 = r;
            }
        }
    }

    if t0 > t1 {
        return None;
    }

    Some((p1 + d * t0, p1 + d * t1))
}
