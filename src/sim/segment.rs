//! Point-to-segment distance
//!
//! Shared by tendril hit-testing and the melee sweep. A segment with
//! coincident endpoints degenerates to a plain point distance, which the
//! melee tip check relies on.

use glam::Vec2;

/// Distance from `point` to the closest point on the finite segment
/// `start..end`. The projection parameter is clamped to [0, 1].
pub fn distance_to_segment(point: Vec2, start: Vec2, end: Vec2) -> f32 {
    let line = end - start;
    let len_sq = line.length_squared();
    if len_sq < 1e-8 {
        // Degenerate segment
        return (point - start).length();
    }

    let t = ((point - start).dot(line) / len_sq).clamp(0.0, 1.0);
    let closest = start + line * t;
    (point - closest).length()
}

/// Whether `point` lies within `radius` of the segment.
#[inline]
pub fn point_near_segment(point: Vec2, start: Vec2, end: Vec2, radius: f32) -> bool {
    distance_to_segment(point, start, end) <= radius
}
