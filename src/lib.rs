//! A small fully connected feedforward network trained with mini-batch stochastic gradient
//! descent, plus the dataset plumbing and evaluation helpers around it.
//!
//! Activations, weights and biases are `ndarray` column vectors and matrices. Two activation
//! functions (sigmoid, tanh) and two cost functions (quadratic, cross-entropy) are supported,
//! with hand-derived gradients.
//!
//! ```rust,no_run
//! use feedforward_playground::{ActivationFunction, CostFunction, Dataset, Instance, Network};
//! use ndarray_rand::rand::thread_rng;
//!
//! let mut training_set = Dataset::from(vec![
//!     Instance::from_slices(&[1.0, -0.5, 3.0], Some(&[0.1, 0.8, 0.05, 0.05])),
//!     Instance::from_slices(&[0.0, 7.0, -0.5], Some(&[0.0, 0.0, 0.1, 0.9])),
//! ]);
//! let mut network = Network::new(vec![3, 5, 4], CostFunction::Quadratic, ActivationFunction::Sigmoid)?;
//! network.train(&mut training_set, 100, 3.0, 2, &mut thread_rng())?;
//! # Ok::<(), feedforward_playground::Error>(())
//! ```

pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod functions;
pub mod mnist;
pub mod network;

pub use dataset::{Dataset, Instance};
pub use error::{Error, Result};
pub use functions::{ActivationFunction, CostFunction};
pub use network::{Network, ParameterGradients};
