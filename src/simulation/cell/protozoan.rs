//! Protozoa: motile cells that see, swim, eat and split.
//!
//! Sensor layout, per vision ray: one-hot kind of the nearest cell hit
//! (plant, meat, protozoan) followed by its proximity. Two proprioceptive
//! inputs follow the rays: health and radius relative to the split radius.
//! The brain must produce at least two outputs, read as turn and speed.

use rand::{Rng, RngCore};

use super::super::brain::{Brain, MlpBrain};
use super::super::error::BrainError;
use super::super::events::SimulationEvent;
use super::super::geometric_utils::{line_circle_distance, sphere_volume};
use super::super::params::Params;
use super::super::vector::Vector2;
use super::{
    Body, Cell, CellKind, CellStats, Fate, Motor, Plan, STATS_DISTANCE_SCALAR, STATS_MASS_SCALAR,
    uniform,
};

/// Inputs per vision ray.
pub const RAY_INPUTS: usize = 4;
/// Motor outputs read from the brain.
pub const MOTOR_OUTPUTS: usize = 2;

/// Number of sensor inputs a protozoan brain receives.
pub fn sensor_count(params: &Params) -> usize {
    RAY_INPUTS * params.vision_rays + 2
}

/// Ray directions spread evenly over the field of view around `heading`.
///
/// A single ray points straight ahead.
pub fn vision_rays(heading: f32, fov: f32, count: usize, length: f32) -> Vec<Vector2> {
    if count == 1 {
        return vec![Vector2::from_angle(heading) * length];
    }
    let step = fov / (count as f32 - 1.0);
    (0..count)
        .map(|i| Vector2::from_angle(heading - fov / 2.0 + i as f32 * step) * length)
        .collect()
}

/// Range of the heritable herbivore factor.
const HERBIVORE_RANGE: (f32, f32) = (0.5, 2.0);

/// Keeps a heritable trait, or redraws it from `range` with probability `chance`.
fn inherit(
    value: f32,
    range: (f32, f32),
    chance: f32,
    rng: &mut dyn RngCore,
    mutations: &mut u32,
) -> f32 {
    if rng.random::<f32>() < chance {
        *mutations += 1;
        uniform(rng, range.0, range.1)
    } else {
        value
    }
}

fn kind_slot(kind: CellKind) -> usize {
    match kind {
        CellKind::Plant => 0,
        CellKind::Meat => 1,
        CellKind::Protozoan => 2,
    }
}

/// State of a protozoan.
#[derive(Debug)]
pub struct Protozoan {
    /// Decision function.
    pub brain: Box<dyn Brain>,
    /// Unit vector the protozoan swims along.
    pub heading: Vector2,
    /// Radius above which it splits.
    pub split_radius: f32,
    /// Relative growth per second while construction mass lasts.
    pub growth_rate: f32,
    /// Plant extraction multiplier; meat extraction uses its inverse.
    pub herbivore_factor: f32,
    /// Mass stored from eating, spent on growth and repair.
    pub construction_mass: f32,
    /// Health lost to starvation on the last tick.
    pub death_rate: f32,
    /// Heritable trait mutations accumulated along the lineage.
    pub mutations: u32,
}

impl Protozoan {
    /// A protozoan with a freshly initialised network brain.
    pub fn new_random(params: &Params, rng: &mut dyn RngCore) -> Result<Self, BrainError> {
        let mut topology = Vec::with_capacity(params.hidden_layers.len() + 2);
        topology.push(sensor_count(params));
        topology.extend_from_slice(&params.hidden_layers);
        topology.push(MOTOR_OUTPUTS);
        let brain = MlpBrain::new_random(&topology, rng)?;
        Ok(Self::with_brain(Box::new(brain), params, rng))
    }

    /// A protozoan with random heritable traits driven by `brain`.
    pub fn with_brain(brain: Box<dyn Brain>, params: &Params, rng: &mut dyn RngCore) -> Self {
        Self {
            brain,
            heading: Vector2::from_angle(std::f32::consts::TAU * rng.random::<f32>()),
            split_radius: uniform(
                rng,
                params.min_protozoan_split_radius,
                params.max_protozoan_split_radius,
            ),
            growth_rate: uniform(
                rng,
                params.min_protozoan_growth_rate,
                params.max_protozoan_growth_rate,
            ),
            herbivore_factor: uniform(rng, HERBIVORE_RANGE.0, HERBIVORE_RANGE.1),
            construction_mass: 0.0,
            death_rate: 0.0,
            mutations: 0,
        }
    }

    /// Most construction mass a body of `radius` can hold.
    pub fn construction_mass_cap(radius: f32, params: &Params) -> f32 {
        2.0 * params.mass_density * sphere_volume(0.25 * radius)
    }

    /// Stores eaten mass, up to the body's capacity.
    pub fn store_mass(&mut self, mass: f32, radius: f32, params: &Params) {
        let cap = Self::construction_mass_cap(radius, params);
        self.construction_mass = (self.construction_mass + mass).clamp(0.0, cap);
    }

    /// Builds the sensor vector from the neighbours found this tick.
    pub fn sense(&self, cell: &Cell, neighbors: &[&Cell], params: &Params) -> Vec<f32> {
        let range = params.protozoa_interact_range;
        let origin = cell.body.pos;
        let rays = vision_rays(
            self.heading.to_angle(),
            params.vision_fov,
            params.vision_rays,
            range,
        );
        let mut inputs = vec![0.0; sensor_count(params)];

        for (i, ray) in rays.iter().enumerate() {
            let end = origin + *ray;
            let mut nearest = f32::MAX;
            for other in neighbors {
                if line_circle_distance(origin, end, other.body.pos) >= other.body.radius {
                    continue;
                }
                let d = (origin.distance(other.body.pos) - other.body.radius).max(0.0);
                if d < nearest {
                    nearest = d;
                    let slot = &mut inputs[i * RAY_INPUTS..(i + 1) * RAY_INPUTS];
                    slot.fill(0.0);
                    slot[kind_slot(other.kind())] = 1.0;
                    slot[3] = (1.0 - d / range).clamp(0.0, 1.0);
                }
            }
        }

        let base = RAY_INPUTS * params.vision_rays;
        inputs[base] = cell.body.health;
        inputs[base + 1] = cell.body.radius / self.split_radius;
        inputs
    }

    pub(crate) fn plan(
        &self,
        cell: &Cell,
        neighbors: &[&Cell],
        params: &Params,
        dt: f32,
        plan: &mut Plan,
    ) -> Result<(), BrainError> {
        let inputs = self.sense(cell, neighbors, params);
        let outputs = self.brain.decide(&inputs)?;
        if outputs.len() < MOTOR_OUTPUTS {
            return Err(BrainError::OutputSize {
                required: MOTOR_OUTPUTS,
                actual: outputs.len(),
            });
        }
        if outputs.iter().any(|v| !v.is_finite()) {
            return Err(BrainError::NonFinite);
        }
        plan.motor = Some(Motor {
            turn: outputs[0].clamp(-1.0, 1.0),
            speed: outputs[1].clamp(-1.0, 1.0),
        });

        for other in neighbors {
            let factor = match other.kind() {
                CellKind::Plant => self.herbivore_factor,
                CellKind::Meat => 1.0 / self.herbivore_factor,
                CellKind::Protozoan => continue,
            };
            let d = cell.body.pos.distance(other.body.pos);
            if 0.95 * d < cell.body.radius + other.body.radius {
                plan.events.push(SimulationEvent::Bite {
                    eater: cell.id,
                    target: other.id,
                    extraction: params.eat_rate * factor * dt,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn update(
        &mut self,
        body: &mut Body,
        motor: Option<Motor>,
        params: &Params,
        dt: f32,
    ) -> Fate {
        let mass = params.mass_density * sphere_volume(body.radius);

        let grown = params.clamp_radius(body.radius * (1.0 + self.growth_rate * dt));
        let cost = params.mass_density * (sphere_volume(grown) - sphere_volume(body.radius));
        if cost > 0.0 && cost < self.construction_mass {
            body.radius = grown;
            self.construction_mass -= cost;
        }

        if body.health < 1.0 && self.growth_rate > 0.0 {
            let required = mass * 0.01 * dt;
            if required < self.construction_mass {
                self.construction_mass -= required;
                body.health += dt * params.cell_repair_rate;
            }
        }

        self.death_rate = body.radius * dt * params.protozoa_starvation_factor;
        body.health -= self.death_rate;

        if let Some(motor) = motor {
            let angle = self.heading.to_angle() + dt * params.max_turn_rate * motor.turn;
            self.heading = Vector2::from_angle(angle);
            let thrust = body.radius / self.split_radius;
            let speed = motor.speed.abs() * params.max_protozoa_speed * thrust;
            body.pos += self.heading * (speed * dt);
        }

        if body.radius > self.split_radius && body.health > params.min_health_to_split {
            Fate::Burst
        } else {
            Fate::Live
        }
    }

    /// State of one offspring receiving `fraction` of the parent's radius.
    pub(crate) fn offspring(
        &self,
        fraction: f32,
        params: &Params,
        rng: &mut dyn RngCore,
    ) -> Result<Self, BrainError> {
        let brain = self.brain.offspring(rng, params.mutation_chance)?;
        let chance = params.mutation_chance;
        let mut mutations = self.mutations;
        let split_radius = inherit(
            self.split_radius,
            (params.min_protozoan_split_radius, params.max_protozoan_split_radius),
            chance,
            rng,
            &mut mutations,
        );
        let growth_rate = inherit(
            self.growth_rate,
            (params.min_protozoan_growth_rate, params.max_protozoan_growth_rate),
            chance,
            rng,
            &mut mutations,
        );
        let herbivore_factor = inherit(
            self.herbivore_factor,
            HERBIVORE_RANGE,
            chance,
            rng,
            &mut mutations,
        );

        Ok(Self {
            brain,
            heading: Vector2::from_angle(std::f32::consts::TAU * rng.random::<f32>()),
            split_radius,
            growth_rate,
            herbivore_factor,
            construction_mass: self.construction_mass * fraction,
            death_rate: 0.0,
            mutations,
        })
    }

    pub(crate) fn add_stats(&self, body: &Body, stats: &mut CellStats) {
        stats.insert("Death Rate".into(), 100.0 * self.death_rate);
        stats.insert(
            "Split Radius".into(),
            STATS_DISTANCE_SCALAR * self.split_radius,
        );
        stats.insert(
            "Growth Rate".into(),
            STATS_DISTANCE_SCALAR * self.growth_rate,
        );
        stats.insert("Mutations".into(), self.mutations as f32);
        stats.insert("Herbivore Factor".into(), self.herbivore_factor);
        stats.insert(
            "Construction Mass".into(),
            STATS_MASS_SCALAR * self.construction_mass,
        );
        stats.insert("Network Depth".into(), self.brain.depth() as f32);
        stats.insert("Network Size".into(), self.brain.size() as f32);
        stats.insert(
            "Relative Size".into(),
            body.radius / self.split_radius,
        );
    }
}
