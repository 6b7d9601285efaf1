//! Plant cells: grow until crowded, burst into bound siblings when large.

use rand::RngCore;

use super::super::chunks::ChunkManager;
use super::super::locatable::CellId;
use super::super::params::Params;
use super::super::vector::with_length;
use super::{Behavior, Body, Cell, CellStats, Fate, Plan, STATS_DISTANCE_SCALAR, uniform};

/// Rest length of a binding as a multiple of the summed radii.
pub const BINDING_TARGET: f32 = 1.1;
/// Bindings break when partners come closer than this multiple of the summed radii.
pub const BINDING_MIN: f32 = 0.95;
/// Bindings break when partners drift further than this multiple of the summed radii.
pub const BINDING_MAX: f32 = 1.3;

/// Whether two bodies sit at a distance a binding tolerates.
pub fn within_binding_range(a: &Body, b: &Body) -> bool {
    let d = a.pos.distance(b.pos);
    let r = a.radius + b.radius;
    (BINDING_MIN * r..=BINDING_MAX * r).contains(&d)
}

/// State of a plant cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Plant {
    /// Growth rate before crowding, size and health are applied.
    pub base_growth: f32,
    /// Radius above which the plant bursts and its growth is damped.
    pub split_radius: f32,
    /// Crowding measured on the last tick.
    pub crowding: f32,
    bindings: Vec<CellId>,
}

impl Plant {
    /// A plant with explicit traits and no bindings.
    pub fn with_traits(base_growth: f32, split_radius: f32) -> Self {
        Self {
            base_growth,
            split_radius,
            crowding: 0.0,
            bindings: Vec::new(),
        }
    }

    /// A plant of the given radius with random growth rate and split radius.
    pub fn new_random(radius: f32, params: &Params, rng: &mut dyn RngCore) -> Self {
        let base_growth = uniform(
            rng,
            params.min_plant_growth,
            params.min_plant_growth + params.plant_growth_range,
        );
        let split_radius = uniform(rng, radius, params.max_plant_birth_radius);
        Self::with_traits(base_growth, split_radius)
    }

    /// Ids of the plants this one is bound to.
    pub fn bindings(&self) -> &[CellId] {
        &self.bindings
    }

    /// Binds to another cell. Binding twice is a no-op.
    pub fn bind(&mut self, partner: CellId) {
        if !self.bindings.contains(&partner) {
            self.bindings.push(partner);
        }
    }

    /// Whether this plant is bound to `other`.
    pub fn is_attached(&self, other: CellId) -> bool {
        self.bindings.contains(&other)
    }

    pub(crate) fn detach(&mut self, ids: &[CellId]) {
        if !ids.is_empty() {
            self.bindings.retain(|id| !ids.contains(id));
        }
    }

    /// Contribution of a neighbour to crowding: larger and closer
    /// neighbours count more, and only those within three radii count at all.
    pub fn crowding_contribution(own: &Body, other: &Body) -> f32 {
        let d2 = own.pos.distance_squared(other.pos);
        let limit = 3.0 * own.radius;
        if d2 < limit * limit {
            other.radius / (own.radius + d2)
        } else {
            0.0
        }
    }

    /// Current growth rate.
    ///
    /// A smooth function of how far crowding is below the critical level.
    /// Overcrowding turns into exponential shrinkage rather than a hard stop.
    pub fn growth_rate(&self, radius: f32, health: f32, params: &Params) -> f32 {
        let decay = params.plant_crowding_growth_decay;
        let mut x = ((params.plant_critical_crowding - self.crowding) / decay).tanh();
        if x < 0.0 {
            x = 1.0 - (-decay * x).exp();
        }
        let mut rate = self.base_growth * x;
        if radius > self.split_radius {
            rate *= (self.split_radius - radius).exp();
        }
        if rate > 0.0 {
            rate *= health;
        }
        rate
    }

    pub(crate) fn plan(
        &self,
        cell: &Cell,
        neighbors: &[&Cell],
        chunks: &ChunkManager<Cell>,
        params: &Params,
        plan: &mut Plan,
    ) {
        let own = &cell.body;
        let my_mass = cell.mass(params);
        let mut crowding = 0.0;

        for other in neighbors {
            crowding += Self::crowding_contribution(own, &other.body);

            if matches!(other.behavior, Behavior::Plant(_)) && !self.is_attached(other.id) {
                let offset = other.body.pos - own.pos;
                let d2 = offset.length_squared();
                let r = own.radius + other.body.radius;
                if d2 > 1.01 * r * r {
                    let force = with_length(offset, params.plant_attraction_factor / d2);
                    plan.accel += force * (1.0 / my_mass);
                }
            }
        }
        plan.crowding = Some(crowding);

        for &partner_id in &self.bindings {
            let Some(partner) = chunks.get(partner_id).filter(|p| p.is_alive()) else {
                plan.detach.push(partner_id);
                continue;
            };
            if !within_binding_range(own, &partner.body) {
                plan.detach.push(partner_id);
                continue;
            }
            let axis = own.pos - partner.body.pos;
            let d = axis.length();
            let offset = BINDING_TARGET * (own.radius + partner.body.radius) - d;
            let their_mass = partner.mass(params);
            let share = their_mass / (my_mass + their_mass);
            plan.push += axis.normalize_or_zero() * (share * offset);
        }
    }

    pub(crate) fn update(
        &mut self,
        body: &mut Body,
        crowding: Option<f32>,
        params: &Params,
        dt: f32,
    ) -> Fate {
        if let Some(crowding) = crowding {
            self.crowding = crowding;
        }
        let rate = self.growth_rate(body.radius, body.health, params);
        if rate < 0.0 {
            body.health += params.plant_regen * dt * rate;
        }

        let grown = body.radius * (1.0 + rate * dt);
        if grown > params.min_plant_birth_radius || rate > 0.0 {
            body.radius = params.clamp_radius(grown);
        }

        if body.radius > self.split_radius && body.health > params.min_health_to_split {
            Fate::Burst
        } else {
            Fate::Live
        }
    }

    pub(crate) fn add_stats(&self, body: &Body, params: &Params, stats: &mut CellStats) {
        stats.insert("Crowding Factor".into(), self.crowding);
        stats.insert(
            "Split Radius".into(),
            STATS_DISTANCE_SCALAR * self.split_radius,
        );
        stats.insert(
            "Growth Rate".into(),
            STATS_DISTANCE_SCALAR * self.growth_rate(body.radius, body.health, params),
        );
        if !self.bindings.is_empty() {
            stats.insert(
                "Num Cell Bindings".into(),
                self.bindings.len() as f32,
            );
        }
    }
}
