//! # Evo Tank - Chunked Cell Simulation
//!
//! A bounded population of plants, protozoa and meat pellets living in a
//! circular tank, advanced by a fixed-step `tick`.
//!
//! ## Features
//!
//! - Uniform chunk grid for broad-phase neighbour queries
//! - Population caps with a deferred admission queue
//! - Crowding-limited plant growth and bursting
//! - Protozoa with evolving neural network brains, vision and eating
//! - Parallel planning with rayon, serial application of cross-cell events
//! - Snapshots readable from other threads and savable as JSON
//!
//! ## Core Modules
//!
//! - [`simulation::tank`] - Admission, the tick pipeline and statistics
//! - [`simulation::chunks`] - Spatial index
//! - [`simulation::cell`] - Cell bodies and variant rules
//! - [`simulation::brain`] - Decision functions
//! - [`simulation::events`] - Cross-cell effects

/// Core simulation logic and data structures.
pub mod simulation {
    /// Decision functions for protozoa.
    pub mod brain;
    /// Cell bodies and the plant, protozoan and meat rules.
    pub mod cell;
    /// Uniform-grid spatial index.
    pub mod chunks;
    /// Error types.
    pub mod error;
    /// Cross-cell events collected during parallel planning.
    pub mod events;
    /// Geometric utility functions for distance calculations.
    pub mod geometric_utils;
    /// Trait for entities with identity, position and extent.
    ///
    /// The [`locatable::Locatable`] trait is what the chunk grid needs to
    /// bucket an entity.
    pub mod locatable;
    /// Simulation parameters.
    pub mod params;
    /// Published read-only views of the tank.
    pub mod snapshot;
    /// Tank orchestration.
    pub mod tank;
    /// Two-dimensional vector math.
    pub mod vector;
}
