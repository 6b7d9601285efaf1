//! Immutable views of the tank for observers and persistence.
//!
//! The tank publishes a fresh [`TankSnapshot`] after seeding and at the end
//! of every tick. Readers on other threads hold a [`SnapshotReader`] and
//! always see a complete tick, never a half-updated one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use super::cell::{Cell, CellKind, CellStats};
use super::error::TankError;
use super::locatable::CellId;
use super::params::Params;
use super::vector::Vector2;

/// Read-only view of one live cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellView {
    /// Stable identity.
    pub id: CellId,
    /// Variant tag.
    pub kind: CellKind,
    /// Centre of the cell.
    pub position: Vector2,
    /// Radius of the cell.
    pub radius: f32,
    /// Health of the cell.
    pub health: f32,
    /// Lineage depth.
    pub generation: u32,
    /// Kind-specific named statistics.
    pub stats: CellStats,
}

impl CellView {
    /// Captures the observable state of `cell`.
    pub fn of(cell: &Cell, params: &Params) -> Self {
        Self {
            id: cell.id,
            kind: cell.kind(),
            position: cell.body.pos,
            radius: cell.body.radius,
            health: cell.body.health,
            generation: cell.generation,
            stats: cell.stats(params),
        }
    }
}

/// State of the tank at the end of a tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TankSnapshot {
    /// Ticks completed.
    pub tick: u64,
    /// Simulated seconds elapsed.
    pub elapsed: f32,
    /// Every live, indexed cell.
    pub cells: Vec<CellView>,
    /// Aggregate statistics.
    pub stats: BTreeMap<String, f32>,
}

impl TankSnapshot {
    /// Number of cells of one kind.
    pub fn count(&self, kind: CellKind) -> usize {
        self.cells.iter().filter(|c| c.kind == kind).count()
    }

    /// Writes the snapshot as JSON.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), TankError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Reads a snapshot written by [`TankSnapshot::save_to_file`].
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, TankError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Shared handle to the latest published snapshot.
///
/// Cheap to clone and safe to send to other threads.
#[derive(Debug, Clone, Default)]
pub struct SnapshotReader {
    slot: Arc<RwLock<Arc<TankSnapshot>>>,
}

impl SnapshotReader {
    /// The most recently published snapshot.
    pub fn latest(&self) -> Arc<TankSnapshot> {
        let guard = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub(crate) fn publish(&self, snapshot: TankSnapshot) {
        let mut guard = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(snapshot);
    }
}
