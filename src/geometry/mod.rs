//! Pure 2D segment/point primitives for cover evaluation
//!
//! Everything here is a total function: geometric degeneracies (zero-length
//! segments, parallel lines) resolve to a defined value instead of an error.

mod primitives;
mod sampling;

pub use primitives::{
    cross2, distance_point_to_segment, intersection_point, projection_on_segment,
    segments_intersect,
};
pub use sampling::{chord_through_rect, rect_sample_points, segment_intersects_rect};
