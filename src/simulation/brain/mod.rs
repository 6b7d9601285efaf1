//! Decision functions for motile cells.
//!
//! The tank only needs a brain to map sensor inputs to motor outputs and to
//! produce a (possibly mutated) copy for offspring. [`MlpBrain`] is the
//! evolving network used by default; [`ConstantBrain`] ignores its inputs.

use ndarray::Array1;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::BrainError;

pub mod mlp;

pub use mlp::Mlp;

/// Weight range of freshly created networks.
const INITIAL_WEIGHT_SCALE: f32 = 1.0;
/// Noise range applied to a mutated weight.
const MUTATION_SCALE: f32 = 0.2;

/// A per-organism decision function.
pub trait Brain: Send + Sync + fmt::Debug {
    /// Maps sensor inputs to motor outputs.
    fn decide(&self, inputs: &[f32]) -> Result<Vec<f32>, BrainError>;

    /// Creates the brain of an offspring, mutating each parameter with
    /// probability `mutation_chance`.
    fn offspring(
        &self,
        rng: &mut dyn RngCore,
        mutation_chance: f32,
    ) -> Result<Box<dyn Brain>, BrainError>;

    /// Short serializable description used for lineage logging.
    fn descriptor(&self) -> String;

    /// Number of parameters in the brain.
    fn size(&self) -> usize;

    /// Number of layers between input and output.
    fn depth(&self) -> usize;
}

/// Multi-layer perceptron brain with tanh activations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpBrain {
    layers: Vec<Mlp>,
    topology: Vec<usize>,
}

impl MlpBrain {
    /// Creates a network with random weights for the given layer sizes,
    /// input layer first.
    pub fn new_random(topology: &[usize], rng: &mut dyn RngCore) -> Result<Self, BrainError> {
        if topology.len() < 2 || topology.contains(&0) {
            return Err(BrainError::InvalidTopology(topology.to_vec()));
        }
        let layers = topology
            .windows(2)
            .map(|w| Mlp::new_random(w[0], w[1], INITIAL_WEIGHT_SCALE, rng))
            .collect();
        Ok(Self {
            layers,
            topology: topology.to_vec(),
        })
    }

    /// Layer sizes, input layer first.
    pub fn topology(&self) -> &[usize] {
        &self.topology
    }

    /// Number of inputs the network accepts.
    pub fn input_size(&self) -> usize {
        self.topology[0]
    }

    /// Number of outputs the network produces.
    pub fn output_size(&self) -> usize {
        self.topology[self.topology.len() - 1]
    }
}

impl Brain for MlpBrain {
    fn decide(&self, inputs: &[f32]) -> Result<Vec<f32>, BrainError> {
        if inputs.len() != self.input_size() {
            return Err(BrainError::InputSize {
                expected: self.input_size(),
                actual: inputs.len(),
            });
        }
        let mut output = Array1::from_vec(inputs.to_vec());
        for layer in &self.layers {
            output = layer.forward(&output);
        }
        if output.iter().any(|v| !v.is_finite()) {
            return Err(BrainError::NonFinite);
        }
        Ok(output.to_vec())
    }

    fn offspring(
        &self,
        rng: &mut dyn RngCore,
        mutation_chance: f32,
    ) -> Result<Box<dyn Brain>, BrainError> {
        let mut child = self.clone();
        for layer in &mut child.layers {
            layer.mutate(mutation_chance, MUTATION_SCALE, rng);
        }
        Ok(Box::new(child))
    }

    fn descriptor(&self) -> String {
        let sizes: Vec<String> = self.topology.iter().map(ToString::to_string).collect();
        format!("mlp[{}]", sizes.join("-"))
    }

    fn size(&self) -> usize {
        self.layers.iter().map(Mlp::parameter_count).sum()
    }

    fn depth(&self) -> usize {
        self.layers.len()
    }
}

/// A brain that returns the same outputs regardless of input.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantBrain {
    outputs: Vec<f32>,
}

impl ConstantBrain {
    /// Creates a brain that always answers `outputs`.
    pub fn new(outputs: Vec<f32>) -> Self {
        Self { outputs }
    }

    /// A brain that neither turns nor swims.
    pub fn idle() -> Self {
        Self::new(vec![0.0, 0.0])
    }
}

impl Brain for ConstantBrain {
    fn decide(&self, _inputs: &[f32]) -> Result<Vec<f32>, BrainError> {
        Ok(self.outputs.clone())
    }

    fn offspring(
        &self,
        _rng: &mut dyn RngCore,
        _mutation_chance: f32,
    ) -> Result<Box<dyn Brain>, BrainError> {
        Ok(Box::new(self.clone()))
    }

    fn descriptor(&self) -> String {
        format!("constant{:?}", self.outputs)
    }

    fn size(&self) -> usize {
        0
    }

    fn depth(&self) -> usize {
        0
    }
}
