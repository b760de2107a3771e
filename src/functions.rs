use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, Zip};

use crate::error::{Error, Result, ensure_shape};

// Keeps ln() finite when the output layer saturates.
const CROSS_ENTROPY_EPS: f64 = 1e-12;

/// Element-wise nonlinearity applied to every layer's pre-activations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationFunction {
    Sigmoid,
    Tanh,
}

impl ActivationFunction {
    /// Maps pre-activations (zetas) to activations, element by element.
    pub fn activate(&self, zetas: &Array2<f64>) -> Array2<f64> {
        match self {
            ActivationFunction::Sigmoid => zetas.mapv(sigmoid),
            ActivationFunction::Tanh => zetas.mapv(f64::tanh),
        }
    }

    /// Derivative of the activation, expressed in terms of the activations it produced rather
    /// than the raw pre-activations: a(1 - a) for sigmoid and 1 - a^2 for tanh.
    pub fn derivative(&self, activations: &Array2<f64>) -> Array2<f64> {
        match self {
            ActivationFunction::Sigmoid => activations.mapv(|a| a * (1.0 - a)),
            ActivationFunction::Tanh => activations.mapv(|a| 1.0 - a * a),
        }
    }
}

impl fmt::Display for ActivationFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationFunction::Sigmoid => write!(f, "sigmoid"),
            ActivationFunction::Tanh => write!(f, "tanh"),
        }
    }
}

impl FromStr for ActivationFunction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sigmoid" => Ok(ActivationFunction::Sigmoid),
            "tanh" => Ok(ActivationFunction::Tanh),
            other => Err(Error::NetworkInitialization(format!(
                "unknown activation function '{other}'"
            ))),
        }
    }
}

/// Loss used to compute the output-layer error signal.
///
/// `CrossEntropy` returns `a - y` as the output delta, omitting the activation slope. That is
/// only the true gradient when paired with [`ActivationFunction::Sigmoid`], where the slope
/// cancels analytically. With `Tanh` the delta is left unscaled and training follows a
/// different (non-gradient) direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostFunction {
    Quadratic,
    CrossEntropy,
}

impl CostFunction {
    /// Output-layer delta, the derivative of the loss with respect to the output pre-activations.
    pub fn derivative(
        &self,
        activations: &Array2<f64>,
        labels: &Array2<f64>,
        activation_function: ActivationFunction,
    ) -> Result<Array2<f64>> {
        ensure_shape("cost derivative labels", activations.dim(), labels)?;
        let error = activations - labels;
        match self {
            CostFunction::Quadratic => Ok(error * activation_function.derivative(activations)),
            CostFunction::CrossEntropy => Ok(error),
        }
    }

    /// Loss value for a single instance.
    pub fn cost(&self, activations: &Array2<f64>, labels: &Array2<f64>) -> Result<f64> {
        ensure_shape("cost labels", activations.dim(), labels)?;
        let cost = match self {
            CostFunction::Quadratic => {
                0.5 * Zip::from(activations)
                    .and(labels)
                    .fold(0.0, |acc, &a, &y| acc + (a - y) * (a - y))
            }
            CostFunction::CrossEntropy => Zip::from(activations)
                .and(labels)
                .fold(0.0, |acc, &a, &y| {
                    let a = a.clamp(CROSS_ENTROPY_EPS, 1.0 - CROSS_ENTROPY_EPS);
                    acc - (y * a.ln() + (1.0 - y) * (1.0 - a).ln())
                }),
        };
        Ok(cost)
    }
}

impl fmt::Display for CostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostFunction::Quadratic => write!(f, "quadratic"),
            CostFunction::CrossEntropy => write!(f, "cross-entropy"),
        }
    }
}

impl FromStr for CostFunction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quadratic" => Ok(CostFunction::Quadratic),
            "cross-entropy" | "cross_entropy" | "crossentropy" => Ok(CostFunction::CrossEntropy),
            other => Err(Error::NetworkInitialization(format!(
                "unknown cost function '{other}'"
            ))),
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + f64::exp(-z))
}
