//! Meat pellets: passive food that decays and eventually expires.

use super::super::params::Params;
use super::{Body, Fate};

/// State of a meat pellet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Meat {
    /// Age in seconds at which the pellet disappears.
    pub lifetime: f32,
}

impl Meat {
    /// A pellet with the configured lifetime.
    pub fn new(params: &Params) -> Self {
        Self {
            lifetime: params.meat_lifetime,
        }
    }

    pub(crate) fn update(&mut self, body: &mut Body, age: f32, params: &Params, dt: f32) -> Fate {
        body.health -= params.meat_decay_rate * dt;
        if age > self.lifetime {
            Fate::Expire
        } else {
            Fate::Live
        }
    }
}
