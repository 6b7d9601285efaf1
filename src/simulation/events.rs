//! Cross-cell effects collected during the parallel phase of a tick.
//!
//! Cells never mutate each other while planning. Anything that changes
//! another cell is recorded as an event and applied serially once every
//! cell has updated itself.

use tracing::trace;

use super::cell::{Behavior, Cell};
use super::chunks::ChunkManager;
use super::locatable::CellId;
use super::params::Params;

/// Health lost by a bitten cell per unit of extraction.
const BITE_DAMAGE: f32 = 5.0;

/// Events that modify cells other than the one that produced them.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationEvent {
    /// A protozoan extracted a fraction of another cell's mass.
    Bite {
        /// ID of the protozoan eating.
        eater: CellId,
        /// ID of the cell being eaten.
        target: CellId,
        /// Fraction of the target's mass extracted.
        extraction: f32,
    },
}

/// Queue for collecting simulation events from parallel updates.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<SimulationEvent>,
}

impl EventQueue {
    /// Creates an empty event queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an event to the queue.
    pub fn push(&mut self, event: SimulationEvent) {
        self.events.push(event);
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drains all events from the queue.
    pub fn drain(&mut self) -> std::vec::Drain<'_, SimulationEvent> {
        self.events.drain(..)
    }
}

impl Extend<SimulationEvent> for EventQueue {
    fn extend<I: IntoIterator<Item = SimulationEvent>>(&mut self, iter: I) {
        self.events.extend(iter);
    }
}

/// Applies all queued events to the cells in `chunks`.
///
/// Events naming a cell that is gone or already dead are dropped.
pub fn apply_events(chunks: &mut ChunkManager<Cell>, params: &Params, mut queue: EventQueue) {
    for event in queue.drain() {
        match event {
            SimulationEvent::Bite {
                eater,
                target,
                extraction,
            } => bite(chunks, params, eater, target, extraction),
        }
    }
}

fn bite(chunks: &mut ChunkManager<Cell>, params: &Params, eater: CellId, target: CellId, extraction: f32) {
    let extraction = extraction.clamp(0.0, 1.0);
    let Some(food) = chunks.get_mut(target).filter(|c| c.is_alive()) else {
        return;
    };
    let extracted = food.mass(params) * extraction;
    food.remove_mass(extracted, params);
    let health = food.body.health * (1.0 - BITE_DAMAGE * extraction);
    if food.is_alive() {
        food.set_health(health, params);
    }

    let Some(cell) = chunks.get_mut(eater).filter(|c| c.is_alive()) else {
        return;
    };
    let radius = cell.body.radius;
    if let Behavior::Protozoan(protozoan) = &mut cell.behavior {
        protozoan.store_mass(params.eating_conversion_ratio * extracted, radius, params);
        trace!(%eater, %target, extracted, "bite");
    }
}
