use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::ConfigError;

/// Simulation parameters that control tank behavior.
///
/// Every field has a default, so a JSON file only needs to name the values it
/// overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Seed for the tank's random number generator.
    pub seed: u64,

    // Arena
    /// Radius of the circular arena, centred at the origin.
    pub tank_radius: f32,
    /// Number of chunk divisions across the arena diameter.
    pub chunk_divisions: usize,
    /// Smallest radius any cell may have.
    pub min_cell_radius: f32,
    /// Largest radius any cell may have.
    pub max_cell_radius: f32,

    // Population
    /// Hard cap on live plant cells.
    pub max_plants: usize,
    /// Hard cap on live protozoa.
    pub max_protozoa: usize,
    /// Hard cap on live meat pellets.
    pub max_meat: usize,
    /// Plants placed by [`Tank::seed_population`](super::tank::Tank::seed_population).
    pub initial_plants: usize,
    /// Protozoa placed by [`Tank::seed_population`](super::tank::Tank::seed_population).
    pub initial_protozoa: usize,
    /// Placement attempts made by `add_random` before giving up.
    pub placement_attempts: usize,
    /// Number of centres the initial population is seeded around. Zero
    /// spreads it over the whole arena.
    pub num_population_clusters: usize,
    /// Radius of each seeding cluster.
    pub population_cluster_radius: f32,

    // Physics
    /// Mass per unit of sphere volume.
    pub mass_density: f32,
    /// Fraction of velocity lost per second to the fluid.
    pub fluid_drag: f32,
    /// Maximum speed of any cell.
    pub max_cell_speed: f32,
    /// Health at or below which a cell is dead.
    pub death_health: f32,
    /// Health above which a cell may split.
    pub min_health_to_split: f32,
    /// Sibling overlap relaxation passes after a burst.
    pub burst_relax_passes: usize,

    // Plants
    /// Smallest radius of a freshly seeded plant.
    pub min_plant_birth_radius: f32,
    /// Largest radius of a freshly seeded plant and upper bound of its split radius.
    pub max_plant_birth_radius: f32,
    /// Lowest base growth rate of a plant.
    pub min_plant_growth: f32,
    /// Spread of the base growth rate above `min_plant_growth`.
    pub plant_growth_range: f32,
    /// Crowding at which plant growth turns negative.
    pub plant_critical_crowding: f32,
    /// Steepness of the crowding response.
    pub plant_crowding_growth_decay: f32,
    /// Health drain multiplier applied to negative growth.
    pub plant_regen: f32,
    /// Strength of long-range plant cohesion.
    pub plant_attraction_factor: f32,
    /// Offspring produced by a plant burst.
    pub plant_burst_count: usize,

    // Protozoa
    /// Smallest radius of a freshly seeded protozoan.
    pub min_protozoan_birth_radius: f32,
    /// Largest radius of a freshly seeded protozoan.
    pub max_protozoan_birth_radius: f32,
    /// Smallest heritable split radius.
    pub min_protozoan_split_radius: f32,
    /// Largest heritable split radius.
    pub max_protozoan_split_radius: f32,
    /// Smallest heritable growth rate.
    pub min_protozoan_growth_rate: f32,
    /// Largest heritable growth rate.
    pub max_protozoan_growth_rate: f32,
    /// Health drained per unit radius per second.
    pub protozoa_starvation_factor: f32,
    /// Neighbour sensing range.
    pub protozoa_interact_range: f32,
    /// Number of vision rays.
    pub vision_rays: usize,
    /// Field of view spanned by the vision rays, in radians.
    pub vision_fov: f32,
    /// Turn rate at full turn output, in radians per second.
    pub max_turn_rate: f32,
    /// Swimming speed at full speed output and split radius.
    pub max_protozoa_speed: f32,
    /// Fraction of extracted mass stored as construction mass.
    pub eating_conversion_ratio: f32,
    /// Fraction of the target's mass extracted per second of contact.
    pub eat_rate: f32,
    /// Health restored per second while construction mass lasts.
    pub cell_repair_rate: f32,
    /// Chance that each heritable trait mutates on split.
    pub mutation_chance: f32,
    /// Offspring produced when a protozoan splits.
    pub protozoan_split_count: usize,
    /// Meat pellets left by a protozoan that dies without splitting.
    pub protozoan_remains_count: usize,
    /// Hidden layer sizes of a protozoan brain.
    pub hidden_layers: Vec<usize>,

    // Meat
    /// Health lost per second by a meat pellet.
    pub meat_decay_rate: f32,
    /// Seconds a meat pellet lasts before it expires.
    pub meat_lifetime: f32,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            seed: 42,
            tank_radius: 2.0,
            chunk_divisions: 20,
            min_cell_radius: 0.005,
            max_cell_radius: 0.15,
            max_plants: 5000,
            max_protozoa: 10000,
            max_meat: 1000,
            initial_plants: 1000,
            initial_protozoa: 100,
            placement_attempts: 5,
            num_population_clusters: 3,
            population_cluster_radius: 0.5,
            mass_density: 1000.0,
            fluid_drag: 0.16,
            max_cell_speed: 0.5,
            death_health: 0.05,
            min_health_to_split: 0.8,
            burst_relax_passes: 8,
            min_plant_birth_radius: 0.005,
            max_plant_birth_radius: 0.03,
            min_plant_growth: 0.01,
            plant_growth_range: 0.1,
            plant_critical_crowding: 6.0,
            plant_crowding_growth_decay: 1.0,
            plant_regen: 2.0,
            plant_attraction_factor: 5e-8,
            plant_burst_count: 4,
            min_protozoan_birth_radius: 0.01,
            max_protozoan_birth_radius: 0.015,
            min_protozoan_split_radius: 0.015,
            max_protozoan_split_radius: 0.03,
            min_protozoan_growth_rate: 0.05,
            max_protozoan_growth_rate: 0.2,
            protozoa_starvation_factor: 40.0,
            protozoa_interact_range: 0.15,
            vision_rays: 4,
            vision_fov: std::f32::consts::FRAC_PI_2,
            max_turn_rate: 80.0_f32.to_radians(),
            max_protozoa_speed: 0.01,
            eating_conversion_ratio: 0.75,
            eat_rate: 1.0,
            cell_repair_rate: 0.5,
            mutation_chance: 0.05,
            protozoan_split_count: 2,
            protozoan_remains_count: 3,
            hidden_layers: vec![12],
            meat_decay_rate: 0.05,
            meat_lifetime: 20.0,
        }
    }
}

impl Params {
    /// Loads parameters from a JSON file and validates them.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let params: Params = serde_json::from_str(&contents)?;
        params.validate()?;
        Ok(params)
    }

    /// Edge length of one chunk.
    pub fn chunk_size(&self) -> f32 {
        2.0 * self.tank_radius / self.chunk_divisions as f32
    }

    /// Clamps a radius into `[min_cell_radius, max_cell_radius]`.
    pub fn clamp_radius(&self, radius: f32) -> f32 {
        radius.clamp(self.min_cell_radius, self.max_cell_radius)
    }

    /// Checks that the parameters describe a runnable tank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(name: &'static str, value: f32) -> Result<(), ConfigError> {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    name,
                    reason: format!("must be positive and finite, got {value}"),
                })
            }
        }

        fn ordered(name: &'static str, lo: f32, hi: f32) -> Result<(), ConfigError> {
            if lo <= hi {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    name,
                    reason: format!("range is inverted ({lo} > {hi})"),
                })
            }
        }

        fn nonzero(name: &'static str, value: usize) -> Result<(), ConfigError> {
            if value > 0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    name,
                    reason: "must be at least 1".to_string(),
                })
            }
        }

        positive("tank_radius", self.tank_radius)?;
        positive("min_cell_radius", self.min_cell_radius)?;
        positive("max_cell_radius", self.max_cell_radius)?;
        positive("mass_density", self.mass_density)?;
        positive("max_cell_speed", self.max_cell_speed)?;
        nonzero("chunk_divisions", self.chunk_divisions)?;
        nonzero("placement_attempts", self.placement_attempts)?;
        nonzero("plant_burst_count", self.plant_burst_count)?;
        nonzero("protozoan_split_count", self.protozoan_split_count)?;
        nonzero("vision_rays", self.vision_rays)?;

        ordered("min_cell_radius", self.min_cell_radius, self.max_cell_radius)?;
        if self.max_cell_radius >= self.tank_radius {
            return Err(ConfigError::Invalid {
                name: "max_cell_radius",
                reason: format!(
                    "{} does not fit inside a tank of radius {}",
                    self.max_cell_radius, self.tank_radius
                ),
            });
        }
        ordered(
            "plant_birth_radius",
            self.min_plant_birth_radius,
            self.max_plant_birth_radius,
        )?;
        ordered(
            "protozoan_birth_radius",
            self.min_protozoan_birth_radius,
            self.max_protozoan_birth_radius,
        )?;
        ordered(
            "protozoan_split_radius",
            self.min_protozoan_split_radius,
            self.max_protozoan_split_radius,
        )?;
        ordered(
            "protozoan_growth_rate",
            self.min_protozoan_growth_rate,
            self.max_protozoan_growth_rate,
        )?;
        if self.num_population_clusters > 0 {
            positive("population_cluster_radius", self.population_cluster_radius)?;
            if 2.0 * self.population_cluster_radius >= self.tank_radius {
                return Err(ConfigError::Invalid {
                    name: "population_cluster_radius",
                    reason: format!(
                        "clusters of radius {} do not fit inside a tank of radius {}",
                        self.population_cluster_radius, self.tank_radius
                    ),
                });
            }
        }
        if !(0.0..1.0).contains(&self.fluid_drag) {
            return Err(ConfigError::Invalid {
                name: "fluid_drag",
                reason: format!("must lie in [0, 1), got {}", self.fluid_drag),
            });
        }
        if self.death_health >= self.min_health_to_split {
            return Err(ConfigError::Invalid {
                name: "min_health_to_split",
                reason: "must exceed death_health".to_string(),
            });
        }
        if self.hidden_layers.contains(&0) {
            return Err(ConfigError::Invalid {
                name: "hidden_layers",
                reason: "layers must have at least one neuron".to_string(),
            });
        }
        Ok(())
    }
}
