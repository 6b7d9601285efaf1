//! The tank: population admission, the tick pipeline and statistics.
//!
//! Each tick runs in this order:
//! 1. cells admitted since the last tick are flushed into the chunk grid;
//! 2. the grid is re-bucketed;
//! 3. every live cell plans in parallel against the read-only grid;
//! 4. plans are applied serially, then cross-cell events;
//! 5. every cell is confined to the arena;
//! 6. dead cells are culled and offspring are admitted for the next tick;
//! 7. the grid is re-bucketed again and a snapshot is published.

use rand::Rng;
use rayon::prelude::*;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::f32::consts::TAU;
use tracing::{debug, info, trace, warn};

use super::brain::Brain;
use super::cell::{
    Behavior, Body, Cell, CellKind, CellStats, Meat, Plan, Plant, Protozoan, Spawner, uniform,
};
use super::chunks::ChunkManager;
use super::error::{BrainError, CellError, TankError};
use super::events::{self, EventQueue};
use super::geometric_utils::confine_to_arena;
use super::locatable::CellId;
use super::params::Params;
use super::snapshot::{CellView, SnapshotReader, TankSnapshot};
use super::vector::Vector2;

/// Receives lifecycle notifications from the tank.
pub trait TankObserver: Send {
    /// Called when a cell is admitted, before it becomes visible.
    fn on_born(&mut self, _cell: &Cell) {}

    /// Called when a dead cell is culled.
    fn on_died(&mut self, _cell: &Cell) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl TankObserver for NullObserver {}

/// Top-level simulation state.
pub struct Tank {
    params: Params,
    chunks: ChunkManager<Cell>,
    pending: Vec<Cell>,
    counts: HashMap<CellKind, usize>,
    spawner: Spawner,
    observer: Box<dyn TankObserver>,
    elapsed: f32,
    ticks: u64,
    total_added: u64,
    protozoa_born: u64,
    max_generation: u32,
    cluster_centres: Vec<Vector2>,
    reader: SnapshotReader,
}

impl Tank {
    /// Creates an empty tank.
    pub fn new(params: Params) -> Result<Self, TankError> {
        params.validate()?;
        if params.chunk_size() < 2.0 * params.max_cell_radius {
            debug!(
                chunk_size = params.chunk_size(),
                max_cell_radius = params.max_cell_radius,
                "chunks are narrower than the largest cell; queries will scan extra chunks"
            );
        }
        info!(
            seed = params.seed,
            tank_radius = params.tank_radius,
            chunk_divisions = params.chunk_divisions,
            "creating tank"
        );
        let tank = Self {
            chunks: ChunkManager::new(&params),
            spawner: Spawner::new(params.seed),
            params,
            pending: Vec::new(),
            counts: HashMap::new(),
            observer: Box::new(NullObserver),
            elapsed: 0.0,
            ticks: 0,
            total_added: 0,
            protozoa_born: 0,
            max_generation: 1,
            cluster_centres: Vec::new(),
            reader: SnapshotReader::default(),
        };
        tank.publish();
        Ok(tank)
    }

    /// Installs the lifecycle observer, replacing the previous one.
    pub fn set_observer(&mut self, observer: Box<dyn TankObserver>) {
        self.observer = observer;
    }

    /// Fills the tank with the configured initial plants and protozoa.
    ///
    /// With `num_population_clusters > 0` the tank first picks that many
    /// cluster centres and every seeded cell lands within
    /// `population_cluster_radius` of one of them. Otherwise cells are spread
    /// over the whole arena. Placement is best effort; cells that find no
    /// free spot are dropped.
    pub fn seed_population(&mut self) -> Result<(), TankError> {
        let cluster_radius = self.params.population_cluster_radius;
        let centres: Vec<Vector2> = (0..self.params.num_population_clusters)
            .map(|_| self.random_position(cluster_radius))
            .collect();
        if !centres.is_empty() {
            debug!(clusters = centres.len(), radius = cluster_radius, "seeding in clusters");
        }
        // Plants keep a wider berth from the cluster centre
        let plant_spacing = if centres.is_empty() { 1.0 } else { 1.5 };

        for _ in 0..self.params.initial_plants {
            let plant = self.new_plant();
            self.add_random_with(plant, |tank, r| tank.seed_position(plant_spacing * r, &centres));
        }
        for _ in 0..self.params.initial_protozoa {
            let protozoan = self.new_protozoan()?;
            self.add_random_with(protozoan, |tank, r| tank.seed_position(r, &centres));
        }
        self.cluster_centres.extend(centres);
        self.flush_pending();
        self.chunks.update();
        info!(
            plants = self.population(CellKind::Plant),
            protozoa = self.population(CellKind::Protozoan),
            "seeded tank"
        );
        self.publish();
        Ok(())
    }

    /// A plant of random birth radius at the origin, not yet admitted.
    pub fn new_plant(&mut self) -> Cell {
        let radius = uniform(
            self.spawner.rng(),
            self.params.min_plant_birth_radius,
            self.params.max_plant_birth_radius,
        );
        let plant = Plant::new_random(radius, &self.params, self.spawner.rng());
        Cell::new(
            self.spawner.next_id(),
            Body::at(Vector2::ZERO, radius),
            Behavior::Plant(plant),
        )
    }

    /// A protozoan with a random network brain at the origin, not yet admitted.
    pub fn new_protozoan(&mut self) -> Result<Cell, BrainError> {
        let protozoan = Protozoan::new_random(&self.params, self.spawner.rng())?;
        Ok(self.protozoan_cell(protozoan))
    }

    /// A protozoan driven by the given brain at the origin, not yet admitted.
    pub fn new_protozoan_with_brain(&mut self, brain: Box<dyn Brain>) -> Cell {
        let protozoan = Protozoan::with_brain(brain, &self.params, self.spawner.rng());
        self.protozoan_cell(protozoan)
    }

    fn protozoan_cell(&mut self, protozoan: Protozoan) -> Cell {
        let radius = uniform(
            self.spawner.rng(),
            self.params.min_protozoan_birth_radius,
            self.params.max_protozoan_birth_radius,
        );
        Cell::new(
            self.spawner.next_id(),
            Body::at(Vector2::ZERO, radius),
            Behavior::Protozoan(protozoan),
        )
    }

    /// A meat pellet of the given radius at the origin, not yet admitted.
    pub fn new_meat(&mut self, radius: f32) -> Cell {
        Cell::new(
            self.spawner.next_id(),
            Body::at(Vector2::ZERO, radius),
            Behavior::Meat(Meat::new(&self.params)),
        )
    }

    /// Population cap for a kind.
    pub fn capacity(&self, kind: CellKind) -> usize {
        match kind {
            CellKind::Plant => self.params.max_plants,
            CellKind::Protozoan => self.params.max_protozoa,
            CellKind::Meat => self.params.max_meat,
        }
    }

    /// Cells of a kind admitted and not yet culled, pending ones included.
    pub fn population(&self, kind: CellKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// Admits a cell. It becomes visible at the start of the next tick.
    ///
    /// Returns `false` and drops the cell if its kind is at capacity, if it
    /// is dead, or if its id is already in use.
    pub fn add(&mut self, mut cell: Cell) -> bool {
        if !cell.is_alive()
            || self.chunks.contains(cell.id)
            || self.pending.iter().any(|c| c.id == cell.id)
        {
            return false;
        }
        let kind = cell.kind();
        if self.population(kind) >= self.capacity(kind) {
            debug!(%kind, id = %cell.id, "population cap reached, rejecting cell");
            return false;
        }

        cell.body.radius = self.params.clamp_radius(cell.body.radius);
        confine_to_arena(&mut cell.body.pos, cell.body.radius, self.params.tank_radius);

        *self.counts.entry(kind).or_insert(0) += 1;
        self.total_added += 1;
        if kind == CellKind::Protozoan {
            self.protozoa_born += 1;
            self.max_generation = self.max_generation.max(cell.generation);
        }
        self.observer.on_born(&cell);
        self.pending.push(cell);
        true
    }

    /// Tries a few random positions for `cell` and admits it at the first
    /// one where it overlaps nothing. Otherwise the cell is discarded.
    pub fn add_random(&mut self, cell: Cell) -> bool {
        self.add_random_with(cell, Self::random_position)
    }

    fn add_random_with(
        &mut self,
        mut cell: Cell,
        mut position: impl FnMut(&mut Self, f32) -> Vector2,
    ) -> bool {
        let radius = self.params.clamp_radius(cell.body.radius);
        for _ in 0..self.params.placement_attempts {
            let pos = position(self, radius);
            if !self.is_occupied(pos, radius) {
                cell.body.pos = pos;
                return self.add(cell);
            }
        }
        debug!(kind = %cell.kind(), id = %cell.id, "no free position found, discarding cell");
        false
    }

    /// A random point at which a cell of `radius` lies well inside the arena.
    ///
    /// The radial coordinate is `rad · (1 − u²)` for uniform `u`, with the
    /// usable radius reduced by twice the cell radius.
    pub fn random_position(&mut self, radius: f32) -> Vector2 {
        let rng = self.spawner.rng();
        let usable = self.params.tank_radius - 2.0 * radius;
        let t = TAU * rng.random::<f32>();
        let u = rng.random::<f32>();
        Vector2::from_angle(t) * (usable * (1.0 - u * u))
    }

    /// A random point near `centre` for a cell of `radius`.
    ///
    /// The distance from the centre is `2·radius + u·(cluster_radius − 4·radius)`,
    /// so the cell stays within `cluster_radius` of the centre.
    pub fn random_position_in(
        &mut self,
        radius: f32,
        centre: Vector2,
        cluster_radius: f32,
    ) -> Vector2 {
        let rng = self.spawner.rng();
        let spread = (cluster_radius - 4.0 * radius).max(0.0);
        let t = TAU * rng.random::<f32>();
        let d = 2.0 * radius + spread * rng.random::<f32>();
        centre + Vector2::from_angle(t) * d
    }

    fn seed_position(&mut self, radius: f32, centres: &[Vector2]) -> Vector2 {
        if centres.is_empty() {
            return self.random_position(radius);
        }
        let centre = centres[self.spawner.rng().random_range(0..centres.len())];
        self.random_position_in(radius, centre, self.params.population_cluster_radius)
    }

    /// Centres the initial population was seeded around. Empty unless
    /// clustered seeding ran.
    pub fn cluster_centres(&self) -> &[Vector2] {
        &self.cluster_centres
    }

    /// Whether a circle at `pos` would overlap an indexed or pending cell.
    pub fn is_occupied(&self, pos: Vector2, radius: f32) -> bool {
        let overlaps = |c: &Cell| {
            let r = radius + c.body.radius;
            c.is_alive() && c.body.pos.distance_squared(pos) < r * r
        };
        self.chunks.broad_phase(pos, radius).any(overlaps) || self.pending.iter().any(overlaps)
    }

    fn flush_pending(&mut self) {
        for cell in std::mem::take(&mut self.pending) {
            self.chunks.add(cell);
        }
    }

    /// Advances the simulation by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        self.elapsed += dt;
        self.ticks += 1;

        self.flush_pending();
        self.chunks.update();

        let plans: Vec<Result<Plan, CellError>> = {
            let chunks = &self.chunks;
            let params = &self.params;
            chunks
                .entities()
                .par_iter()
                .map(|cell| {
                    if cell.is_alive() {
                        cell.plan(chunks, params, dt)
                    } else {
                        Ok(Plan::default())
                    }
                })
                .collect()
        };

        let mut queue = EventQueue::new();
        let mut offspring = Vec::new();
        let mut failures = 0_usize;
        for (cell, plan) in self.chunks.entities_mut().iter_mut().zip(plans) {
            if !cell.is_alive() {
                continue;
            }
            let result = plan.and_then(|mut plan| {
                queue.extend(plan.events.drain(..));
                cell.apply(plan, &self.params, dt, &mut self.spawner)
            });
            match result {
                Ok(children) => offspring.extend(children),
                Err(err) => {
                    warn!(%err, "cell update failed, removing cell");
                    cell.discard();
                    failures += 1;
                }
            }
        }
        events::apply_events(&mut self.chunks, &self.params, queue);

        let tank_radius = self.params.tank_radius;
        for cell in self.chunks.entities_mut() {
            confine_to_arena(&mut cell.body.pos, cell.body.radius, tank_radius);
        }

        let died = self.cull(&mut offspring);
        let born = offspring.len();
        for child in offspring {
            self.add(child);
        }
        self.chunks.update();

        trace!(
            tick = self.ticks,
            cells = self.chunks.len(),
            born,
            died,
            failures,
            "tick complete"
        );
        self.publish();
    }

    /// Removes dead cells, notifying the observer and collecting remains.
    fn cull(&mut self, offspring: &mut Vec<Cell>) -> usize {
        let dead = self.chunks.remove_where(|c| !c.is_alive());
        for cell in &dead {
            if let Some(count) = self.counts.get_mut(&cell.kind()) {
                *count = count.saturating_sub(1);
            }
            self.observer.on_died(cell);
            if cell.leaves_remains() {
                offspring.extend(cell.remains(&self.params, &mut self.spawner));
            }
        }
        dead.len()
    }

    /// Live, indexed cells in storage order.
    pub fn cells(&self) -> &[Cell] {
        self.chunks.entities()
    }

    /// Cells admitted but not yet visible.
    pub fn pending(&self) -> &[Cell] {
        &self.pending
    }

    /// Looks up an indexed cell.
    pub fn get(&self, id: CellId) -> Option<&Cell> {
        self.chunks.get(id)
    }

    /// The spatial index.
    pub fn chunks(&self) -> &ChunkManager<Cell> {
        &self.chunks
    }

    /// The parameters the tank was created with.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Simulated seconds elapsed.
    pub fn elapsed_time(&self) -> f32 {
        self.elapsed
    }

    /// Ticks completed.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Deepest protozoan generation ever admitted.
    pub fn max_generation(&self) -> u32 {
        self.max_generation
    }

    /// Cells ever admitted.
    pub fn total_added(&self) -> u64 {
        self.total_added
    }

    /// Protozoa ever admitted.
    pub fn protozoa_born(&self) -> u64 {
        self.protozoa_born
    }

    /// Aggregate statistics.
    ///
    /// `Mean <key>` entries sum each protozoan's statistic divided by the
    /// number of all indexed cells, plants and meat included.
    pub fn stats(&self) -> BTreeMap<String, f32> {
        let mut stats = BTreeMap::new();
        for kind in CellKind::ALL {
            stats.insert(
                kind.population_label().to_string(),
                self.population(kind) as f32,
            );
        }
        stats.insert("Max Generation".to_string(), self.max_generation as f32);
        stats.insert("Time Elapsed".to_string(), self.elapsed);
        stats.insert("Protozoa Born".to_string(), self.protozoa_born as f32);
        stats.insert("Total Entities Born".to_string(), self.total_added as f32);

        let n = self.chunks.len() as f32;
        let mut sums = CellStats::new();
        for cell in self.live_protozoa() {
            for (key, value) in cell.stats(&self.params) {
                *sums.entry(key).or_insert(0.0) += value;
            }
        }
        for (key, sum) in sums {
            stats.insert(format!("Mean {key}"), sum / n);
        }
        stats
    }

    /// Per-protozoan `Sum`, `Mean` and `Var` of every protozoan statistic.
    pub fn protozoa_stats(&self) -> BTreeMap<String, f32> {
        let mut samples: BTreeMap<Cow<'static, str>, Vec<f32>> = BTreeMap::new();
        for cell in self.live_protozoa() {
            for (key, value) in cell.stats(&self.params) {
                samples.entry(key).or_default().push(value);
            }
        }

        let mut stats = BTreeMap::new();
        for (key, values) in samples {
            let n = values.len() as f32;
            let sum: f32 = values.iter().sum();
            let mean = sum / n;
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
            stats.insert(format!("Sum {key}"), sum);
            stats.insert(format!("Mean {key}"), mean);
            stats.insert(format!("Var {key}"), var);
        }
        stats
    }

    fn live_protozoa(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.chunks
            .iter()
            .filter(|c| c.is_alive() && c.kind() == CellKind::Protozoan)
    }

    /// Captures the current state.
    pub fn snapshot(&self) -> TankSnapshot {
        TankSnapshot {
            tick: self.ticks,
            elapsed: self.elapsed,
            cells: self
                .chunks
                .iter()
                .filter(|c| c.is_alive())
                .map(|c| CellView::of(c, &self.params))
                .collect(),
            stats: self.stats(),
        }
    }

    /// Handle to the snapshot published at the end of each tick.
    pub fn reader(&self) -> SnapshotReader {
        self.reader.clone()
    }

    fn publish(&self) {
        self.reader.publish(self.snapshot());
    }
}
