//! Two-dimensional vector math used for positions, velocities and forces.
//!
//! Arithmetic comes from [`glam`]; this module only bridges to the [`geo`]
//! types used for segment distance queries.

/// A 2D point or displacement. The arena centre is [`Vector2::ZERO`].
pub type Vector2 = glam::Vec2;

/// Converts a vector into a [`geo::Point`].
pub fn to_point(v: Vector2) -> geo::Point<f32> {
    geo::Point::new(v.x, v.y)
}

/// Rescales `v` to length `len`. The zero vector stays zero.
pub fn with_length(v: Vector2, len: f32) -> Vector2 {
    v.normalize_or_zero() * len
}
