//! Geometric utility functions for distance calculations and spatial operations.

use geo::algorithm::Distance;
use geo::{Euclidean, Line};

use super::vector::{Vector2, to_point, with_length};

/// Calculates the minimum distance between a line segment and a circle center.
///
/// # Arguments
///
/// * `line_start` - Starting point of the line segment
/// * `line_end` - Ending point of the line segment
/// * `circle_center` - Center point of the circle
///
/// # Returns
///
/// The minimum Euclidean distance from the circle center to the line segment.
pub fn line_circle_distance(line_start: Vector2, line_end: Vector2, circle_center: Vector2) -> f32 {
    let line = Line::new(to_point(line_start), to_point(line_end));
    Euclidean.distance(&to_point(circle_center), &line)
}

/// Volume of a sphere with the given radius. Cell mass is density times this.
pub fn sphere_volume(radius: f32) -> f32 {
    4.0 / 3.0 * std::f32::consts::PI * radius * radius * radius
}

/// Radius of the sphere whose volume is `volume`.
pub fn sphere_radius(volume: f32) -> f32 {
    (3.0 * volume.max(0.0) / (4.0 * std::f32::consts::PI)).cbrt()
}

/// Forces a circle back inside a circular arena centred at the origin.
///
/// When `|pos| + radius` exceeds `arena_radius` the position is moved along
/// the same direction to just inside the boundary. This is a teleport, not a
/// bounce: velocity is untouched.
///
/// # Returns
///
/// `true` if the position was changed.
pub fn confine_to_arena(pos: &mut Vector2, radius: f32, arena_radius: f32) -> bool {
    const SLACK: f32 = 0.98;

    if pos.length() + radius > arena_radius {
        *pos = with_length(*pos, SLACK * (arena_radius - radius));
        true
    } else {
        false
    }
}
