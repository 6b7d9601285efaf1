//! Trait for entities that occupy a circle in the arena.
//!
//! The chunk grid only needs identity, position and extent, so it is generic
//! over this trait rather than tied to [`Cell`](super::cell::Cell).

use serde::{Deserialize, Serialize};
use std::fmt;

use super::vector::Vector2;

/// Stable identifier of an entity, unique for the lifetime of a tank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(pub u64);

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Trait for entities with an identity, a position and a circular extent.
///
/// Any type that implements this trait can be bucketed by
/// [`ChunkManager`](super::chunks::ChunkManager).
pub trait Locatable {
    /// Returns the entity's stable identifier.
    fn id(&self) -> CellId;

    /// Returns the entity's position.
    fn pos(&self) -> Vector2;

    /// Returns the radius of the entity's bounding circle.
    fn radius(&self) -> f32;

    /// Whether the entity should still be indexed.
    fn is_alive(&self) -> bool {
        true
    }

    /// Whether the bounding circles of `self` and `other` overlap.
    fn overlaps(&self, other: &impl Locatable) -> bool
    where
        Self: Sized,
    {
        if self.id() == other.id() {
            return false;
        }
        let r = self.radius() + other.radius();
        self.pos().distance_squared(other.pos()) < r * r
    }
}
