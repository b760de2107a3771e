use ndarray::{Array, Array2};
use ndarray_rand::{
    RandomExt,
    rand::{Rng, thread_rng},
    rand_distr::StandardNormal,
};
use tracing::{debug, info, warn};

use crate::dataset::{Dataset, Instance};
use crate::error::{Error, Result, ensure_shape};
use crate::functions::{ActivationFunction, CostFunction};

pub const MAX_NUM_LAYERS: usize = 10;
pub const MAX_LAYER_SIZE: usize = 10000;

/// Derivatives of the cost with respect to every weight and bias, one entry per connection
/// between consecutive layers. Entry `l` has the same shape as the network's `weights()[l]` and
/// `biases()[l]`.
#[derive(Debug, Clone)]
pub struct ParameterGradients {
    pub nabla_weights: Vec<Array2<f64>>,
    pub nabla_biases: Vec<Array2<f64>>,
}

/// A fully connected feedforward network trained with stochastic gradient descent.
///
/// For `sizes = [n0, n1, ..., nL]`, connection `l` holds a [n(l+1) x n(l)] weight matrix and a
/// [n(l+1) x 1] bias column. All activations are column vectors.
#[derive(Debug, Clone)]
pub struct Network {
    num_layers: usize,
    sizes: Vec<usize>,
    biases: Vec<Array2<f64>>,
    weights: Vec<Array2<f64>>,
    cost_function: CostFunction,
    activation_function: ActivationFunction,
}

impl Network {
    /// Builds a network whose weights and biases are drawn from a standard normal distribution
    /// using the thread-local generator.
    pub fn new(
        sizes: Vec<usize>,
        cost_function: CostFunction,
        activation_function: ActivationFunction,
    ) -> Result<Network> {
        Network::with_rng(sizes, cost_function, activation_function, &mut thread_rng())
    }

    /// Same as [`Network::new`], drawing the initial parameters from `rng`.
    pub fn with_rng<R: Rng + ?Sized>(
        sizes: Vec<usize>,
        cost_function: CostFunction,
        activation_function: ActivationFunction,
        rng: &mut R,
    ) -> Result<Network> {
        validate_sizes(&sizes)?;

        let mut biases = Vec::with_capacity(sizes.len() - 1);
        let mut weights = Vec::with_capacity(sizes.len() - 1);
        // Each connection draws its weights, then its biases, so a seeded generator always
        // yields the same network for the same sizes.
        for (&current_size, &next_size) in sizes.iter().zip(sizes.iter().skip(1)) {
            weights.push(Array::random_using((next_size, current_size), StandardNormal, rng));
            biases.push(Array::random_using((next_size, 1), StandardNormal, rng));
            debug!(current_size, next_size, "initialized connection");
        }

        info!(?sizes, %cost_function, %activation_function, "random initialization completed");
        Ok(Network {
            num_layers: sizes.len(),
            sizes,
            biases,
            weights,
            cost_function,
            activation_function,
        })
    }

    /// Builds a network from explicit parameters. `weights[l]` must be [sizes[l+1] x sizes[l]]
    /// and `biases[l]` must be [sizes[l+1] x 1]. The matrices are copied, so the caller keeps
    /// ownership of its own.
    pub fn from_parameters(
        sizes: Vec<usize>,
        weights: &[Array2<f64>],
        biases: &[Array2<f64>],
        cost_function: CostFunction,
        activation_function: ActivationFunction,
    ) -> Result<Network> {
        validate_sizes(&sizes)?;
        validate_parameters(&sizes, weights, biases)?;

        info!(?sizes, %cost_function, %activation_function, "initialization completed");
        Ok(Network {
            num_layers: sizes.len(),
            sizes,
            biases: biases.iter().map(|bias| bias.to_owned()).collect(),
            weights: weights.iter().map(|weight| weight.to_owned()).collect(),
            cost_function,
            activation_function,
        })
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn num_layers(&self) -> usize {
        self.num_layers
    }

    pub fn weights(&self) -> &[Array2<f64>] {
        &self.weights
    }

    pub fn biases(&self) -> &[Array2<f64>] {
        &self.biases
    }

    pub fn cost_function(&self) -> CostFunction {
        self.cost_function
    }

    pub fn activation_function(&self) -> ActivationFunction {
        self.activation_function
    }

    /// Calculates the activations of the output layer for a [sizes[0] x 1] input column.
    pub fn feed_forward(&self, input: &Array2<f64>) -> Result<Array2<f64>> {
        ensure_shape("feedforward input", (self.sizes[0], 1), input)?;

        let mut activation = input.to_owned();
        for (bias, weight) in self.biases.iter().zip(self.weights.iter()) {
            let zetas = weight.dot(&activation) + bias;
            activation = self.activation_function.activate(&zetas);
        }
        Ok(activation)
    }

    /// Computes the cost gradient for a single labelled instance.
    ///
    /// Fails with `Error::NoLabel` for an unlabelled instance, and with
    /// `Error::DimensionMismatch` if its features or labels do not fit the input and output
    /// layers.
    pub fn backpropagate(&self, instance: &Instance) -> Result<ParameterGradients> {
        let features = instance.features();
        let labels = instance.labels()?;
        ensure_shape("instance features", (self.sizes[0], 1), features)?;

        // The index of the output layer. weights and biases both have `last` entries, one per
        // connection between consecutive layers, while activations will hold `last + 1`.
        let last = self.num_layers - 1;

        // Feed the instance forward, but keep every layer's output instead of only the final
        // one. activations[0] is the input itself and activations[l] is the output of layer l.
        // Only the outputs are kept, not the weighted inputs, as both activation derivatives can
        // be written in terms of the output alone.
        let mut activations = Vec::with_capacity(self.num_layers);
        activations.push(features.to_owned());
        for (bias, weight) in self.biases.iter().zip(self.weights.iter()) {
            let zetas = weight.dot(&activations[activations.len() - 1]) + bias;
            activations.push(self.activation_function.activate(&zetas));
        }

        let mut nabla_weights = Vec::with_capacity(last);
        let mut nabla_biases = Vec::with_capacity(last);

        // The error of the output layer comes straight from the cost function. For the quadratic
        // cost this is (a - y) multiplied element-wise by the activation slope, while the
        // cross-entropy cost cancels the slope and leaves just (a - y). The bias gradient is the
        // delta itself, and the weight gradient is the delta times the transposed activation of
        // the layer feeding into the output layer, which gives a matrix of the same shape as
        // weights[last - 1].
        let mut delta =
            self.cost_function
                .derivative(&activations[last], labels, self.activation_function)?;
        nabla_weights.push(delta.dot(&activations[last - 1].t()));
        nabla_biases.push(delta.clone());

        // Walk back through the hidden layers, from the one just before the output down to the
        // first hidden layer. weights[layer] maps layer -> layer + 1, so its transpose carries
        // the delta of layer + 1 back onto layer. Multiplying element-wise by the slope of layer
        // then gives that layer's own delta, from which its gradients follow exactly as they did
        // for the output layer. The input layer has no parameters, so the loop stops at 1.
        for layer in (1..last).rev() {
            let slope = self.activation_function.derivative(&activations[layer]);
            delta = self.weights[layer].t().dot(&delta) * slope;
            nabla_weights.push(delta.dot(&activations[layer - 1].t()));
            nabla_biases.push(delta.clone());
        }

        // Gradients were collected output-first, but callers index them the same way as weights
        // and biases, so flip them back into input-first order.
        nabla_weights.reverse();
        nabla_biases.reverse();

        Ok(ParameterGradients {
            nabla_weights,
            nabla_biases,
        })
    }

    /// Applies the gradients of every instance in `batch`, each scaled by
    /// `learning_rate / batch_size`, returning how many instances contributed.
    ///
    /// The parameters move after every instance, so later instances in the batch are
    /// backpropagated against the partially updated network. This differs from textbook
    /// mini-batch SGD, which averages every gradient against one fixed snapshot.
    ///
    /// Unlabelled instances are skipped with a warning. Any other error aborts the batch,
    /// keeping the updates already applied.
    pub fn update_parameters(
        &mut self,
        batch: &Dataset,
        learning_rate: f64,
        batch_size: usize,
    ) -> Result<usize> {
        if !(learning_rate > 0.0) || batch_size < 1 {
            return Err(Error::NetworkInitialization(format!(
                "invalid update parameters: learning rate {learning_rate}, batch size {batch_size}"
            )));
        }

        let scale = learning_rate / batch_size as f64;
        let mut applied = 0;
        for (position, instance) in batch.iter().enumerate() {
            let gradients = match self.backpropagate(instance) {
                Ok(gradients) => gradients,
                Err(Error::NoLabel) => {
                    warn!(position, "found instance without label, learning may be unstable");
                    continue;
                }
                Err(err) => return Err(err),
            };

            for (weight, nabla_weight) in self.weights.iter_mut().zip(gradients.nabla_weights) {
                *weight = &*weight - &(nabla_weight * scale);
            }
            for (bias, nabla_bias) in self.biases.iter_mut().zip(gradients.nabla_biases) {
                *bias = &*bias - &(nabla_bias * scale);
            }
            applied += 1;
        }
        Ok(applied)
    }

    /// Trains the network with stochastic gradient descent.
    ///
    /// Every epoch shuffles `training_set` in place, splits it into contiguous mini-batches of
    /// `mini_batch_size` (the last one taking whatever remains) and updates the parameters
    /// batch by batch. Runs exactly `epochs` passes. Invalid hyperparameters or an empty
    /// training set fail before anything is touched.
    pub fn train<R: Rng + ?Sized>(
        &mut self,
        training_set: &mut Dataset,
        epochs: usize,
        learning_rate: f64,
        mini_batch_size: usize,
        rng: &mut R,
    ) -> Result<()> {
        if training_set.is_empty() || epochs < 1 || !(learning_rate > 0.0) || mini_batch_size < 1
        {
            return Err(Error::NetworkInitialization(format!(
                "invalid gradient descent parameters: {} instances, {epochs} epochs, \
                 learning rate {learning_rate}, mini batch size {mini_batch_size}",
                training_set.len()
            )));
        }

        for epoch in 0..epochs {
            training_set.shuffle(rng);
            info!(epoch, "gradient descent epoch");

            let len = training_set.len();
            for (index, start) in (0..len).step_by(mini_batch_size).enumerate() {
                let mini_batch = training_set.sub_set(start, (start + mini_batch_size).min(len))?;
                debug!(index, size = mini_batch.len(), "mini batch");
                self.update_parameters(&mini_batch, learning_rate, mini_batch.len())?;
            }
        }
        Ok(())
    }

    /// Mean cost over the labelled instances of `dataset`.
    pub fn total_cost(&self, dataset: &Dataset) -> Result<f64> {
        let mut total = 0.0;
        let mut counted = 0;
        for instance in dataset.iter().filter(|instance| instance.is_labelled()) {
            let output = self.feed_forward(instance.features())?;
            total += self.cost_function.cost(&output, instance.labels()?)?;
            counted += 1;
        }
        if counted == 0 {
            return Err(Error::NoLabel);
        }
        Ok(total / counted as f64)
    }
}

fn validate_sizes(sizes: &[usize]) -> Result<()> {
    if sizes.len() < 2 || sizes.len() > MAX_NUM_LAYERS {
        return Err(Error::NetworkInitialization(format!(
            "number of layers must be between 2 and {MAX_NUM_LAYERS}, got {}",
            sizes.len()
        )));
    }
    if let Some(size) = sizes.iter().find(|&&size| size < 1 || size > MAX_LAYER_SIZE) {
        return Err(Error::NetworkInitialization(format!(
            "layer size must be between 1 and {MAX_LAYER_SIZE}, got {size}"
        )));
    }
    Ok(())
}

fn validate_parameters(
    sizes: &[usize],
    weights: &[Array2<f64>],
    biases: &[Array2<f64>],
) -> Result<()> {
    if weights.len() != sizes.len() - 1 || biases.len() != sizes.len() - 1 {
        return Err(Error::NetworkInitialization(format!(
            "expected {} weight and bias matrices, got {} weights and {} biases",
            sizes.len() - 1,
            weights.len(),
            biases.len()
        )));
    }
    for (layer, (weight, bias)) in weights.iter().zip(biases).enumerate() {
        let expected_weight = (sizes[layer + 1], sizes[layer]);
        let expected_bias = (sizes[layer + 1], 1);
        if weight.dim() != expected_weight || bias.dim() != expected_bias {
            return Err(Error::NetworkInitialization(format!(
                "connection {layer} must have weights {expected_weight:?} and biases \
                 {expected_bias:?}, got {:?} and {:?}",
                weight.dim(),
                bias.dim()
            )));
        }
    }
    Ok(())
}
