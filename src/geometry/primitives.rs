//! Segment/segment intersection and point-to-segment distance

use glam::Vec2;

/// 2D cross product of (b - a) and (c - a)
pub fn cross2(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Orientation sign of the triplet (a, b, c): >0 counter-clockwise,
/// <0 clockwise, 0 colinear
fn orientation(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    cross2(a, b, c)
}

/// Is point c on segment ab, assuming the three are colinear?
fn on_segment(a: Vec2, b: Vec2, c: Vec2) -> bool {
    c.x >= a.x.min(b.x) && c.x <= a.x.max(b.x) && c.y >= a.y.min(b.y) && c.y <= a.y.max(b.y)
}

/// Do segments p1-p2 and q1-q2 intersect?
///
/// Orientation + on-segment tests; colinear overlap counts as intersecting.
pub fn segments_intersect(p1: Vec2, p2: Vec2, q1: Vec2, q2: Vec2) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    // Colinear endpoints lying on the other segment
    (d1 == 0.0 && on_segment(q1, q2, p1))
        || (d2 == 0.0 && on_segment(q1, q2, p2))
        || (d3 == 0.0 && on_segment(p1, p2, q1))
        || (d4 == 0.0 && on_segment(p1, p2, q2))
}

/// Intersection point of segments p1-p2 and q1-q2
///
/// Returns `None` for non-intersecting, parallel, or colinear-overlapping
/// pairs (the overlap has no single point).
pub fn intersection_point(p1: Vec2, p2: Vec2, q1: Vec2, q2: Vec2) -> Option<Vec2> {
    let r = p2 - p1;
    let s = q2 - q1;
    let denom = r.x * s.y - r.y * s.x;

    if denom == 0.0 {
        return None;
    }

    let qp = q1 - p1;
    let t = (qp.x * s.y - qp.y * s.x) / denom;
    let u = (qp.x * r.y - qp.y * r.x) / denom;

    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(p1 + r * t)
    } else {
        None
    }
}

/// Projection parameter of `point` onto segment a-b, clamped to [0, 1]
///
/// A zero-length segment projects everything onto its single point (t = 0).
pub fn projection_on_segment(point: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return 0.0;
    }
    ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0)
}

/// Shortest distance from `point` to segment a-b
///
/// Zero-length segments fall back to plain point distance.
pub fn distance_point_to_segment(point: Vec2, a: Vec2, b: Vec2) -> f32 {
    let t = projection_on_segment(point, a, b);
    let closest = a + (b - a) * t;
    point.distance(closest)
}
