//! Uniform-grid spatial index over the arena.
//!
//! The grid covers the square bounding the circular arena, padded by one
//! chunk on every side. Positions outside the grid are clamped to the edge
//! chunks, so every entity always has exactly one home chunk.
//!
//! Entities are stored densely in insertion order and referenced from the
//! buckets by index. Mutating positions through [`ChunkManager::entities_mut`]
//! leaves the buckets stale until the next [`ChunkManager::update`].

use std::collections::HashMap;

use super::locatable::{CellId, Locatable};
use super::params::Params;
use super::vector::Vector2;

/// Owner of the live entity store and its grid bucketing.
#[derive(Debug)]
pub struct ChunkManager<T> {
    chunks_per_axis: usize,
    chunk_size: f32,
    origin: f32,
    max_radius: f32,
    entities: Vec<T>,
    lookup: HashMap<CellId, usize>,
    home: Vec<usize>,
    buckets: Vec<Vec<usize>>,
}

impl<T: Locatable> ChunkManager<T> {
    /// Creates an empty grid sized for the tank described by `params`.
    pub fn new(params: &Params) -> Self {
        Self::with_dimensions(
            params.tank_radius,
            params.chunk_divisions,
            params.max_cell_radius,
        )
    }

    /// Creates an empty grid of `divisions` chunks across the arena diameter.
    pub fn with_dimensions(tank_radius: f32, divisions: usize, max_radius: f32) -> Self {
        let divisions = divisions.max(1);
        let chunks_per_axis = divisions + 2;
        let chunk_size = 2.0 * tank_radius / divisions as f32;
        Self {
            chunks_per_axis,
            chunk_size,
            origin: -tank_radius - chunk_size,
            max_radius,
            entities: Vec::new(),
            lookup: HashMap::new(),
            home: Vec::new(),
            buckets: vec![Vec::new(); chunks_per_axis * chunks_per_axis],
        }
    }

    /// Edge length of one chunk.
    pub fn chunk_size(&self) -> f32 {
        self.chunk_size
    }

    /// Total number of chunks, padding included.
    pub fn chunk_count(&self) -> usize {
        self.buckets.len()
    }

    fn axis_coord(&self, v: f32) -> usize {
        let c = ((v - self.origin) / self.chunk_size).floor();
        if c.is_nan() || c < 0.0 {
            0
        } else {
            (c as usize).min(self.chunks_per_axis - 1)
        }
    }

    /// Index of the chunk containing `pos`.
    pub fn chunk_of(&self, pos: Vector2) -> usize {
        self.axis_coord(pos.y) * self.chunks_per_axis + self.axis_coord(pos.x)
    }

    /// Inserts an entity into the chunk matching its position.
    ///
    /// Returns `false` without changing anything if an entity with the same
    /// id is already present.
    pub fn add(&mut self, entity: T) -> bool {
        let id = entity.id();
        if self.lookup.contains_key(&id) {
            return false;
        }
        let index = self.entities.len();
        let chunk = self.chunk_of(entity.pos());
        self.entities.push(entity);
        self.lookup.insert(id, index);
        self.home.push(chunk);
        self.buckets[chunk].push(index);
        true
    }

    /// Moves every entity whose position left its home chunk into the chunk
    /// it now occupies. Running it twice in a row changes nothing.
    pub fn update(&mut self) {
        for index in 0..self.entities.len() {
            let chunk = self.chunk_of(self.entities[index].pos());
            let old = self.home[index];
            if chunk != old {
                let bucket = &mut self.buckets[old];
                if let Some(slot) = bucket.iter().position(|&i| i == index) {
                    bucket.swap_remove(slot);
                }
                self.buckets[chunk].push(index);
                self.home[index] = chunk;
            }
        }
    }

    /// Removes every entity matching `dead` and returns them in storage order.
    pub fn remove_where(&mut self, mut dead: impl FnMut(&T) -> bool) -> Vec<T> {
        if !self.entities.iter().any(&mut dead) {
            return Vec::new();
        }
        let (removed, kept): (Vec<T>, Vec<T>) = std::mem::take(&mut self.entities)
            .into_iter()
            .partition(|e| dead(e));
        self.rebuild(kept);
        removed
    }

    fn rebuild(&mut self, entities: Vec<T>) {
        self.lookup.clear();
        self.home.clear();
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        for (index, entity) in entities.iter().enumerate() {
            let chunk = self.chunk_of(entity.pos());
            self.lookup.insert(entity.id(), index);
            self.home.push(chunk);
            self.buckets[chunk].push(index);
        }
        self.entities = entities;
    }

    /// Candidates whose circle may overlap the circle of radius `range`
    /// around `pos`.
    ///
    /// Scans every chunk within `range` plus the largest entity radius, so
    /// no overlapping entity is missed. Non-overlapping candidates may be
    /// returned. Order is unspecified.
    pub fn broad_phase(&self, pos: Vector2, range: f32) -> impl Iterator<Item = &T> + '_ {
        let reach = range.max(0.0) + self.max_radius;
        let (x0, x1) = (self.axis_coord(pos.x - reach), self.axis_coord(pos.x + reach));
        let (y0, y1) = (self.axis_coord(pos.y - reach), self.axis_coord(pos.y + reach));
        let n = self.chunks_per_axis;
        (y0..=y1)
            .flat_map(move |cy| (x0..=x1).map(move |cx| cy * n + cx))
            .flat_map(move |chunk| self.buckets[chunk].iter().map(move |&i| &self.entities[i]))
    }

    /// Entities homed in one chunk.
    pub fn bucket(&self, chunk: usize) -> impl Iterator<Item = &T> + '_ {
        self.buckets
            .get(chunk)
            .into_iter()
            .flatten()
            .map(move |&i| &self.entities[i])
    }

    /// Ids per chunk, sorted within each chunk.
    pub fn membership(&self) -> Vec<Vec<CellId>> {
        self.buckets
            .iter()
            .map(|bucket| {
                let mut ids: Vec<CellId> = bucket.iter().map(|&i| self.entities[i].id()).collect();
                ids.sort_unstable();
                ids
            })
            .collect()
    }

    /// Chunk the entity is currently filed under.
    pub fn home_chunk(&self, id: CellId) -> Option<usize> {
        self.lookup.get(&id).map(|&i| self.home[i])
    }

    /// All stored entities in insertion order.
    pub fn entities(&self) -> &[T] {
        &self.entities
    }

    /// Mutable access to the stored entities. Buckets are not updated until
    /// the next call to [`ChunkManager::update`].
    pub fn entities_mut(&mut self) -> &mut [T] {
        &mut self.entities
    }

    /// Iterates over all stored entities.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entities.iter()
    }

    /// Storage index of an entity.
    pub fn index_of(&self, id: CellId) -> Option<usize> {
        self.lookup.get(&id).copied()
    }

    /// Looks up an entity by id.
    pub fn get(&self, id: CellId) -> Option<&T> {
        self.index_of(id).map(|i| &self.entities[i])
    }

    /// Looks up an entity by id for mutation.
    pub fn get_mut(&mut self, id: CellId) -> Option<&mut T> {
        self.index_of(id).map(|i| &mut self.entities[i])
    }

    /// Whether an entity with this id is stored.
    pub fn contains(&self, id: CellId) -> bool {
        self.lookup.contains_key(&id)
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
