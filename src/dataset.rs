use std::fmt;
use std::sync::Arc;

use ndarray::{Array, Array2};
use ndarray_rand::{
    RandomExt,
    rand::{Rng, seq::SliceRandom},
    rand_distr::StandardNormal,
};
use tracing::warn;

use crate::error::{Error, Result};

/// A single input to the network: a [n x 1] feature column and, for training or testing, a
/// label column matching the output layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    features: Array2<f64>,
    labels: Option<Array2<f64>>,
}

impl Instance {
    pub fn new(features: Array2<f64>, labels: Array2<f64>) -> Instance {
        Instance {
            features,
            labels: Some(labels),
        }
    }

    /// An instance usable for inference only.
    pub fn unlabelled(features: Array2<f64>) -> Instance {
        Instance {
            features,
            labels: None,
        }
    }

    /// Builds an instance from plain slices, turning each into a column vector.
    pub fn from_slices(features: &[f64], labels: Option<&[f64]>) -> Instance {
        Instance {
            features: column(features),
            labels: labels.map(column),
        }
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    /// Returns the labels, or `Error::NoLabel` if this instance has none.
    pub fn labels(&self) -> Result<&Array2<f64>> {
        self.labels.as_ref().ok_or(Error::NoLabel)
    }

    pub fn is_labelled(&self) -> bool {
        self.labels.is_some()
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "features")?;
        writeln!(f, "{}", self.features)?;
        writeln!(f, "labels")?;
        match &self.labels {
            Some(labels) => write!(f, "{labels}"),
            None => write!(f, "none"),
        }
    }
}

/// Ordered collection of instances.
///
/// Instances are reference counted, so [`Dataset::sub_set`] and cloning share the same
/// underlying instances instead of copying their matrices.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    instances: Vec<Arc<Instance>>,
}

impl Dataset {
    pub fn new() -> Dataset {
        Dataset::default()
    }

    /// `num_instances` unlabelled instances whose features are drawn from a standard normal
    /// distribution.
    pub fn random_unlabelled<R: Rng + ?Sized>(
        num_features: usize,
        num_instances: usize,
        rng: &mut R,
    ) -> Dataset {
        (0..num_instances)
            .map(|_| Instance::unlabelled(Array::random_using((num_features, 1), StandardNormal, rng)))
            .collect()
    }

    /// Like [`Dataset::random_unlabelled`], with standard normal labels as well.
    pub fn random_labelled<R: Rng + ?Sized>(
        num_features: usize,
        num_labels: usize,
        num_instances: usize,
        rng: &mut R,
    ) -> Dataset {
        (0..num_instances)
            .map(|_| {
                let features = Array::random_using((num_features, 1), StandardNormal, rng);
                let labels = Array::random_using((num_labels, 1), StandardNormal, rng);
                Instance::new(features, labels)
            })
            .collect()
    }

    pub fn push(&mut self, instance: Instance) {
        self.instances.push(Arc::new(instance));
    }

    // Adds an instance that another dataset already holds, without copying its matrices.
    pub(crate) fn push_shared(&mut self, instance: Arc<Instance>) {
        self.instances.push(instance);
    }

    pub(crate) fn shared(&self) -> impl Iterator<Item = &Arc<Instance>> {
        self.instances.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Instance> {
        self.instances.get(index).map(|instance| &**instance)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter().map(|instance| &**instance)
    }

    /// Reorders the instances in place.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.instances.shuffle(rng);
    }

    /// Returns the instances in `start..end` as a new dataset sharing the same instances.
    pub fn sub_set(&self, start: usize, end: usize) -> Result<Dataset> {
        if start > end || end > self.instances.len() {
            return Err(Error::DatasetInitialization(format!(
                "sub set {start}..{end} is out of range for a dataset of {} instances",
                self.instances.len()
            )));
        }
        Ok(Dataset {
            instances: self.instances[start..end].to_vec(),
        })
    }

    /// Drops every unlabelled instance and returns how many were removed.
    pub fn remove_unlabelled(&mut self) -> usize {
        let before = self.instances.len();
        self.instances.retain(|instance| instance.is_labelled());
        let removed = before - self.instances.len();
        if removed > 0 {
            warn!(removed, "removed unlabelled instances");
        }
        removed
    }

    #[cfg(test)]
    pub(crate) fn shares_instance(&self, index: usize, other: &Dataset, other_index: usize) -> bool {
        Arc::ptr_eq(&self.instances[index], &other.instances[other_index])
    }
}

impl From<Vec<Instance>> for Dataset {
    fn from(instances: Vec<Instance>) -> Self {
        instances.into_iter().collect()
    }
}

impl FromIterator<Instance> for Dataset {
    fn from_iter<I: IntoIterator<Item = Instance>>(iter: I) -> Self {
        Dataset {
            instances: iter.into_iter().map(Arc::new).collect(),
        }
    }
}

/// Turns a slice into a [len x 1] column vector.
pub fn column(values: &[f64]) -> Array2<f64> {
    Array::from_shape_fn((values.len(), 1), |(i, _)| values[i])
}
