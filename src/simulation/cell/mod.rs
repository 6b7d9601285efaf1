//! Cells: the physical body shared by every entity plus its variant behavior.
//!
//! A tick touches a cell twice. [`Cell::plan`] runs in parallel against a
//! read-only view of the tank and returns a [`Plan`] (collision push, forces,
//! crowding, motor intent, bites). [`Cell::apply`] then runs serially and
//! changes only the cell itself.

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use super::chunks::ChunkManager;
use super::error::CellError;
use super::events::SimulationEvent;
use super::geometric_utils::{sphere_radius, sphere_volume};
use super::locatable::{CellId, Locatable};
use super::params::Params;
use super::vector::{Vector2, with_length};

pub mod meat;
pub mod plant;
pub mod protozoan;

pub use meat::Meat;
pub use plant::Plant;
pub use protozoan::Protozoan;

/// Named per-cell statistics. Keys are static labels, so building the map
/// allocates no strings.
pub type CellStats = BTreeMap<Cow<'static, str>, f32>;

/// Scales distances in reported statistics.
pub(crate) const STATS_DISTANCE_SCALAR: f32 = 100.0;
/// Scales masses in reported statistics.
pub(crate) const STATS_MASS_SCALAR: f32 = 1000.0;

/// The closed set of cell variants. Each kind has its own population cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CellKind {
    /// Sessile, crowding-limited producer.
    Plant,
    /// Motile organism driven by a brain.
    Protozoan,
    /// Decaying food pellet.
    Meat,
}

impl CellKind {
    /// Every kind, in reporting order.
    pub const ALL: [CellKind; 3] = [CellKind::Protozoan, CellKind::Plant, CellKind::Meat];

    /// Population label used in tank statistics.
    pub fn population_label(self) -> &'static str {
        match self {
            CellKind::Plant => "Plants",
            CellKind::Protozoan => "Protozoa",
            CellKind::Meat => "Meat Pellets",
        }
    }
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CellKind::Plant => "Plant",
            CellKind::Protozoan => "Protozoan",
            CellKind::Meat => "Meat",
        };
        f.write_str(name)
    }
}

/// Physical state of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Body {
    /// Centre of the cell.
    pub pos: Vector2,
    /// Velocity in arena units per second.
    pub vel: Vector2,
    /// Radius of the cell.
    pub radius: f32,
    /// Health in `(death_health, 1]` while alive.
    pub health: f32,
}

impl Body {
    /// A resting body with full health.
    pub fn at(pos: Vector2, radius: f32) -> Self {
        Self {
            pos,
            vel: Vector2::ZERO,
            radius,
            health: 1.0,
        }
    }
}

/// Variant-specific state and rules.
#[derive(Debug)]
pub enum Behavior {
    /// See [`Plant`].
    Plant(Plant),
    /// See [`Protozoan`].
    Protozoan(Protozoan),
    /// See [`Meat`].
    Meat(Meat),
}

/// Motor intent produced by a brain for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motor {
    /// Turn command in `[-1, 1]`.
    pub turn: f32,
    /// Swim command; only its magnitude is used.
    pub speed: f32,
}

/// Everything a cell decided during the parallel phase of a tick.
#[derive(Debug, Default)]
pub struct Plan {
    /// Positional correction from overlaps and binding constraints.
    pub push: Vector2,
    /// Acceleration from long-range forces.
    pub accel: Vector2,
    /// Plant crowding measured this tick.
    pub crowding: Option<f32>,
    /// Protozoan motor intent.
    pub motor: Option<Motor>,
    /// Effects on other cells, applied after every cell has updated.
    pub events: Vec<SimulationEvent>,
    /// Bindings to drop.
    pub detach: Vec<CellId>,
}

/// What the variant rule decided for the cell this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fate {
    Live,
    Burst,
    Expire,
}

/// Source of randomness and fresh ids for everything the tank creates.
#[derive(Debug, Clone)]
pub struct Spawner {
    rng: ChaCha12Rng,
    next_id: u64,
}

impl Spawner {
    /// Creates a spawner seeded deterministically.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha12Rng::seed_from_u64(seed),
            next_id: 0,
        }
    }

    /// Returns an id never handed out before by this spawner.
    pub fn next_id(&mut self) -> CellId {
        let id = CellId(self.next_id);
        self.next_id += 1;
        id
    }

    /// The tank's random number generator.
    pub fn rng(&mut self) -> &mut ChaCha12Rng {
        &mut self.rng
    }
}

/// Uniform sample in `[lo, hi)`, or `lo` when the range is empty.
pub(crate) fn uniform(rng: &mut dyn RngCore, lo: f32, hi: f32) -> f32 {
    lo + (hi - lo) * rng.random::<f32>()
}

/// A single simulated entity.
#[derive(Debug)]
pub struct Cell {
    /// Stable identity.
    pub id: CellId,
    /// Physical state.
    pub body: Body,
    /// Lineage depth; seeded cells are generation 1.
    pub generation: u32,
    /// Seconds since admission.
    pub age: f32,
    /// Variant state.
    pub behavior: Behavior,
    alive: bool,
    remains_handled: bool,
}

impl Locatable for Cell {
    fn id(&self) -> CellId {
        self.id
    }

    fn pos(&self) -> Vector2 {
        self.body.pos
    }

    fn radius(&self) -> f32 {
        self.body.radius
    }

    fn is_alive(&self) -> bool {
        self.alive
    }
}

impl Cell {
    /// Creates a live first-generation cell.
    pub fn new(id: CellId, body: Body, behavior: Behavior) -> Self {
        Self {
            id,
            body,
            generation: 1,
            age: 0.0,
            behavior,
            alive: true,
            remains_handled: false,
        }
    }

    /// The cell's variant tag.
    pub fn kind(&self) -> CellKind {
        match self.behavior {
            Behavior::Plant(_) => CellKind::Plant,
            Behavior::Protozoan(_) => CellKind::Protozoan,
            Behavior::Meat(_) => CellKind::Meat,
        }
    }

    /// Plant state, if this is a plant.
    pub fn as_plant(&self) -> Option<&Plant> {
        match &self.behavior {
            Behavior::Plant(p) => Some(p),
            _ => None,
        }
    }

    /// Protozoan state, if this is a protozoan.
    pub fn as_protozoan(&self) -> Option<&Protozoan> {
        match &self.behavior {
            Behavior::Protozoan(p) => Some(p),
            _ => None,
        }
    }

    /// Whether the cell takes part in ticks.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Marks the cell dead. A protozoan killed this way leaves meat behind.
    pub fn kill(&mut self) {
        self.alive = false;
        self.body.health = 0.0;
    }

    /// Marks the cell dead without leaving remains.
    pub fn discard(&mut self) {
        self.kill();
        self.remains_handled = true;
    }

    /// Whether culling this cell should scatter meat pellets.
    pub fn leaves_remains(&self) -> bool {
        !self.alive && !self.remains_handled && self.kind() == CellKind::Protozoan
    }

    /// Sets health, capping it at 1 and killing the cell below the death threshold.
    pub fn set_health(&mut self, health: f32, params: &Params) {
        self.body.health = health.min(1.0);
        if self.body.health < params.death_health {
            self.kill();
        }
    }

    /// Mass of the cell's body.
    pub fn mass(&self, params: &Params) -> f32 {
        params.mass_density * sphere_volume(self.body.radius)
    }

    /// Shrinks the cell so that it loses `mass`. The cell dies once it would
    /// shrink below 90% of the minimum radius.
    pub fn remove_mass(&mut self, mass: f32, params: &Params) {
        let volume = sphere_volume(self.body.radius) - mass / params.mass_density;
        let radius = sphere_radius(volume);
        if radius < 0.9 * params.min_cell_radius {
            self.kill();
        }
        self.body.radius = params.clamp_radius(radius);
    }

    /// Current speed.
    pub fn speed(&self) -> f32 {
        self.body.vel.length()
    }

    /// Whether all physical quantities are finite.
    pub fn is_finite(&self) -> bool {
        self.body.pos.is_finite()
            && self.body.vel.is_finite()
            && self.body.radius.is_finite()
            && self.body.health.is_finite()
    }

    /// How far around itself the cell looks for neighbours.
    pub fn sensing_range(&self, params: &Params) -> f32 {
        match &self.behavior {
            Behavior::Plant(_) => 3.0 * self.body.radius,
            Behavior::Protozoan(_) => params.protozoa_interact_range.max(self.body.radius),
            Behavior::Meat(_) => self.body.radius,
        }
    }

    /// Named statistics for display and aggregation.
    pub fn stats(&self, params: &Params) -> CellStats {
        let mut stats = CellStats::new();
        stats.insert("Age".into(), 100.0 * self.age);
        stats.insert("Health".into(), 100.0 * self.body.health);
        stats.insert("Size".into(), STATS_DISTANCE_SCALAR * self.body.radius);
        stats.insert("Speed".into(), STATS_DISTANCE_SCALAR * self.speed());
        stats.insert("Generation".into(), self.generation as f32);
        stats.insert("Total Mass".into(), STATS_MASS_SCALAR * self.mass(params));
        match &self.behavior {
            Behavior::Plant(p) => p.add_stats(&self.body, params, &mut stats),
            Behavior::Protozoan(p) => p.add_stats(&self.body, &mut stats),
            Behavior::Meat(_) => {}
        }
        stats
    }

    /// Senses the neighbourhood and decides this tick's actions.
    ///
    /// Runs one broad-phase query and reuses it for crowding, vision, eating
    /// and collisions. Only reads shared state.
    pub fn plan(&self, chunks: &ChunkManager<Cell>, params: &Params, dt: f32) -> Result<Plan, CellError> {
        let neighbors: Vec<&Cell> = chunks
            .broad_phase(self.body.pos, self.sensing_range(params))
            .filter(|other| other.id != self.id && other.is_alive())
            .collect();

        let mut plan = Plan {
            push: self.collision_push(&neighbors, params),
            ..Plan::default()
        };

        match &self.behavior {
            Behavior::Plant(plant) => plant.plan(self, &neighbors, chunks, params, &mut plan),
            Behavior::Protozoan(protozoan) => protozoan
                .plan(self, &neighbors, params, dt, &mut plan)
                .map_err(|source| CellError::Brain {
                    id: self.id,
                    source,
                })?,
            Behavior::Meat(_) => {}
        }
        Ok(plan)
    }

    /// Displacement that resolves overlaps with neighbours, weighted so the
    /// lighter cell moves more.
    fn collision_push(&self, neighbors: &[&Cell], params: &Params) -> Vector2 {
        let my_mass = self.mass(params);
        let mut push = Vector2::ZERO;
        for other in neighbors {
            let r = self.body.radius + other.body.radius;
            let axis = self.body.pos - other.body.pos;
            let d2 = axis.length_squared();
            if d2 >= r * r {
                continue;
            }
            let d = d2.sqrt();
            let normal = if d > 0.0 {
                axis * (1.0 / d)
            } else if self.id < other.id {
                Vector2::new(-1.0, 0.0)
            } else {
                Vector2::new(1.0, 0.0)
            };
            let their_mass = other.mass(params);
            let share = their_mass / (their_mass + my_mass);
            push += normal * (share * (r - d));
        }
        push
    }

    /// Applies this tick's plan and the cell's own rule.
    ///
    /// Returns offspring when the cell bursts; the parent is then dead.
    pub fn apply(
        &mut self,
        plan: Plan,
        params: &Params,
        dt: f32,
        spawner: &mut Spawner,
    ) -> Result<Vec<Cell>, CellError> {
        if !self.alive {
            return Ok(Vec::new());
        }
        self.age += dt;

        let fate = match &mut self.behavior {
            Behavior::Plant(plant) => {
                plant.detach(&plan.detach);
                plant.update(&mut self.body, plan.crowding, params, dt)
            }
            Behavior::Protozoan(protozoan) => {
                protozoan.update(&mut self.body, plan.motor, params, dt)
            }
            Behavior::Meat(meat) => meat.update(&mut self.body, self.age, params, dt),
        };

        self.integrate(&plan, params, dt);
        if !self.is_finite() {
            return Err(CellError::NonFinite { id: self.id });
        }
        self.set_health(self.body.health, params);
        if !self.alive {
            return Ok(Vec::new());
        }

        match fate {
            Fate::Live => Ok(Vec::new()),
            Fate::Expire => {
                self.discard();
                Ok(Vec::new())
            }
            Fate::Burst => self.burst(params, spawner),
        }
    }

    fn integrate(&mut self, plan: &Plan, params: &Params, dt: f32) {
        let body = &mut self.body;
        body.vel += plan.accel * dt;
        body.vel = body.vel * (1.0 - params.fluid_drag).powf(dt);
        if body.vel.length_squared() > params.max_cell_speed * params.max_cell_speed {
            body.vel = with_length(body.vel, params.max_cell_speed);
        }
        body.pos += body.vel * dt + plan.push;
    }

    /// Replaces the cell with smaller offspring of the same kind.
    fn burst(&mut self, params: &Params, spawner: &mut Spawner) -> Result<Vec<Cell>, CellError> {
        let count = match &self.behavior {
            Behavior::Plant(_) => params.plant_burst_count,
            Behavior::Protozoan(_) => params.protozoan_split_count,
            Behavior::Meat(_) => 0,
        };
        let chain = self.kind() == CellKind::Plant;
        let slots = scatter(&self.body, count, chain, params, spawner.rng());

        let mut children = Vec::with_capacity(slots.len());
        for slot in &slots {
            let behavior = match &self.behavior {
                Behavior::Plant(_) => {
                    Behavior::Plant(Plant::new_random(slot.radius, params, spawner.rng()))
                }
                Behavior::Protozoan(parent) => Behavior::Protozoan(
                    parent
                        .offspring(slot.fraction, params, spawner.rng())
                        .map_err(|source| CellError::Brain {
                            id: self.id,
                            source,
                        })?,
                ),
                Behavior::Meat(_) => Behavior::Meat(Meat::new(params)),
            };
            children.push(self.child(slot, behavior, spawner));
        }

        if chain {
            bind_chain(&mut children);
        }

        if let Behavior::Protozoan(parent) = &self.behavior {
            tracing::debug!(
                id = %self.id,
                generation = self.generation,
                brain = %parent.brain.descriptor(),
                mutations = parent.mutations,
                offspring = children.len(),
                "protozoan split"
            );
        } else {
            tracing::debug!(
                id = %self.id,
                kind = %self.kind(),
                offspring = children.len(),
                "cell burst"
            );
        }
        self.discard();
        Ok(children)
    }

    /// Meat pellets scattered by a protozoan that died without splitting.
    pub fn remains(&self, params: &Params, spawner: &mut Spawner) -> Vec<Cell> {
        if !self.leaves_remains() {
            return Vec::new();
        }
        let slots = scatter(
            &self.body,
            params.protozoan_remains_count,
            false,
            params,
            spawner.rng(),
        );
        slots
            .iter()
            .map(|slot| self.child(slot, Behavior::Meat(Meat::new(params)), spawner))
            .collect()
    }

    fn child(&self, slot: &Slot, behavior: Behavior, spawner: &mut Spawner) -> Cell {
        let mut child = Cell::new(spawner.next_id(), Body::at(slot.pos, slot.radius), behavior);
        child.generation = self.generation + 1;
        child
    }
}

/// Largest share of the parent's mass the offspring may carry together.
const MASS_BUDGET: f32 = 0.999;

/// Placement of one offspring.
#[derive(Debug, Clone, Copy)]
struct Slot {
    pos: Vector2,
    radius: f32,
    fraction: f32,
}

/// Lays out up to `count` offspring around `parent`.
///
/// Offspring sit at evenly spaced angles, `2 × childRadius` from the parent
/// centre. Radius fractions are rescaled so the offspring never outweigh the
/// parent, and offspring below the minimum radius are dropped.
fn scatter(
    parent: &Body,
    count: usize,
    chain: bool,
    params: &Params,
    rng: &mut dyn RngCore,
) -> Vec<Slot> {
    if count == 0 {
        return Vec::new();
    }
    let n = count as f32;
    let mut fractions: Vec<f32> = (0..count)
        .map(|_| 0.3 + 0.7 * rng.random::<f32>() / n)
        .collect();
    let total: f32 = fractions.iter().map(|p| p * p * p).sum();
    if total > MASS_BUDGET {
        let scale = (MASS_BUDGET / total).cbrt();
        for p in &mut fractions {
            *p *= scale;
        }
    }

    let step = std::f32::consts::TAU / n;
    let mut angle = std::f32::consts::TAU * rng.random::<f32>();
    let mut slots = Vec::with_capacity(count);
    for fraction in fractions {
        let radius = parent.radius * fraction;
        if radius >= params.min_cell_radius {
            slots.push(Slot {
                pos: parent.pos + Vector2::from_angle(angle) * (2.0 * radius),
                radius,
                fraction,
            });
        }
        angle += step;
    }

    for _ in 0..params.burst_relax_passes {
        for i in 0..slots.len() {
            for j in (i + 1)..slots.len() {
                separate(&mut slots, i, j);
            }
        }
        if chain {
            for i in 1..slots.len() {
                tether(&mut slots, i - 1, i);
            }
        }
    }
    slots
}

fn mass_split(a: &Slot, b: &Slot) -> (f32, f32) {
    let ma = a.radius.powi(3);
    let mb = b.radius.powi(3);
    (mb / (ma + mb), ma / (ma + mb))
}

fn separate(slots: &mut [Slot], i: usize, j: usize) {
    let axis = slots[i].pos - slots[j].pos;
    let r = slots[i].radius + slots[j].radius;
    let d = axis.length();
    if d >= r {
        return;
    }
    let normal = if d > 0.0 {
        axis * (1.0 / d)
    } else {
        Vector2::new(1.0, 0.0)
    };
    let (si, sj) = mass_split(&slots[i], &slots[j]);
    let overlap = r - d;
    slots[i].pos += normal * (si * overlap);
    slots[j].pos -= normal * (sj * overlap);
}

fn tether(slots: &mut [Slot], i: usize, j: usize) {
    let axis = slots[i].pos - slots[j].pos;
    let d = axis.length();
    if d == 0.0 {
        return;
    }
    let offset = plant::BINDING_TARGET * (slots[i].radius + slots[j].radius) - d;
    let normal = axis * (1.0 / d);
    let (si, sj) = mass_split(&slots[i], &slots[j]);
    slots[i].pos += normal * (si * offset);
    slots[j].pos -= normal * (sj * offset);
}

/// Binds consecutive plant siblings that ended up within binding range.
fn bind_chain(children: &mut [Cell]) {
    for i in 1..children.len() {
        let (a, b) = (&children[i - 1], &children[i]);
        if !plant::within_binding_range(&a.body, &b.body) {
            continue;
        }
        let (a_id, b_id) = (a.id, b.id);
        if let Behavior::Plant(p) = &mut children[i - 1].behavior {
            p.bind(b_id);
        }
        if let Behavior::Plant(p) = &mut children[i].behavior {
            p.bind(a_id);
        }
    }
}
