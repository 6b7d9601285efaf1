//! Error types for configuration, brains, per-cell updates and persistence.

use thiserror::Error;

use super::locatable::CellId;

/// A parameter set that cannot describe a runnable tank.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A named parameter has an unusable value.
    #[error("invalid parameter `{name}`: {reason}")]
    Invalid {
        /// Field name.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// The parameter file could not be read.
    #[error("failed to read parameter file: {0}")]
    Io(#[from] std::io::Error),
    /// The parameter file is not valid JSON for [`Params`](super::params::Params).
    #[error("failed to parse parameter file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure inside a decision function.
#[derive(Debug, Error)]
pub enum BrainError {
    /// Layer sizes that cannot form a network.
    #[error("invalid brain topology {0:?}")]
    InvalidTopology(Vec<usize>),
    /// Input vector length differs from what the brain was built for.
    #[error("brain expects {expected} inputs, got {actual}")]
    InputSize {
        /// Inputs the brain was built for.
        expected: usize,
        /// Inputs it received.
        actual: usize,
    },
    /// The brain produces fewer outputs than the body needs.
    #[error("brain produces {actual} outputs, at least {required} are required")]
    OutputSize {
        /// Outputs the body reads.
        required: usize,
        /// Outputs the brain produces.
        actual: usize,
    },
    /// An output was NaN or infinite.
    #[error("brain produced a non-finite output")]
    NonFinite,
}

/// An entity-local failure during a tick. The tank kills the cell and carries on.
#[derive(Debug, Error)]
pub enum CellError {
    /// The cell's decision function failed.
    #[error("cell {id}: {source}")]
    Brain {
        /// Failing cell.
        id: CellId,
        /// Underlying brain failure.
        #[source]
        source: BrainError,
    },
    /// Position, velocity, radius or health became NaN or infinite.
    #[error("cell {id} reached a non-finite state")]
    NonFinite {
        /// Failing cell.
        id: CellId,
    },
}

/// Failures surfaced by the tank to its caller.
#[derive(Debug, Error)]
pub enum TankError {
    /// Invalid parameters.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A brain could not be built during seeding.
    #[error(transparent)]
    Brain(#[from] BrainError),
    /// Snapshot file could not be read or written.
    #[error("snapshot io failed: {0}")]
    Io(#[from] std::io::Error),
    /// Snapshot file is not valid JSON.
    #[error("snapshot serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}
