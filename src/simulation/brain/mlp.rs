//! Multi-layer perceptron implementation.

use ndarray::{Array1, Array2};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// A single layer of a multi-layer perceptron.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mlp {
    /// Weight matrix (`output_size` × `input_size`).
    pub weights: Array2<f32>,
    /// Bias vector (`output_size`).
    pub biases: Array1<f32>,
}

impl Mlp {
    /// Creates a new layer with weights and biases drawn uniformly from `[-scale, scale)`.
    pub fn new_random(
        input_size: usize,
        output_size: usize,
        scale: f32,
        rng: &mut dyn RngCore,
    ) -> Self {
        let weights =
            Array2::from_shape_fn((output_size, input_size), |_| rng.random_range(-scale..scale));
        let biases = Array1::from_shape_fn(output_size, |_| rng.random_range(-scale..scale));
        Self { weights, biases }
    }

    /// Number of inputs the layer accepts.
    pub fn input_size(&self) -> usize {
        self.weights.ncols()
    }

    /// Number of outputs the layer produces.
    pub fn output_size(&self) -> usize {
        self.weights.nrows()
    }

    /// Number of trainable parameters.
    pub fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }

    /// Performs forward pass with tanh activation.
    #[inline]
    pub fn forward(&self, inputs: &Array1<f32>) -> Array1<f32> {
        let mut output = self.weights.dot(inputs);
        output += &self.biases;
        output.mapv_inplace(f32::tanh);
        output
    }

    /// Perturbs each weight and bias with probability `chance` by uniform noise
    /// in `[-scale, scale)`. Returns the number of parameters changed.
    pub fn mutate(&mut self, chance: f32, scale: f32, rng: &mut dyn RngCore) -> usize {
        let mut changed = 0;
        let mut perturb = |value: &mut f32| {
            if rng.random::<f32>() < chance {
                *value += rng.random_range(-scale..scale);
                changed += 1;
            }
        };
        self.weights.map_inplace(&mut perturb);
        self.biases.map_inplace(&mut perturb);
        changed
    }
}
