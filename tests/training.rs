use approx::assert_abs_diff_eq;
use feedforward_playground::{
    ActivationFunction, CostFunction, Dataset, Error, Instance, Network,
};
use ndarray::{Array2, array};
use ndarray_rand::rand::{SeedableRng, rngs::StdRng};

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

// Plain-array parameters of a [2, 3, 2] network.
#[derive(Debug, Clone, Copy)]
struct Reference {
    w1: [[f64; 2]; 3],
    b1: [f64; 3],
    w2: [[f64; 3]; 2],
    b2: [f64; 2],
}

impl Reference {
    // One quadratic-cost, sigmoid SGD step on a single instance, written out by hand.
    fn step(&mut self, x: [f64; 2], y: [f64; 2], eta: f64) {
        let mut h = [0.0; 3];
        for j in 0..3 {
            h[j] = sigmoid(self.w1[j][0] * x[0] + self.w1[j][1] * x[1] + self.b1[j]);
        }
        let mut o = [0.0; 2];
        for i in 0..2 {
            o[i] = sigmoid(self.w2[i][0] * h[0] + self.w2[i][1] * h[1] + self.w2[i][2] * h[2] + self.b2[i]);
        }

        let mut d2 = [0.0; 2];
        for i in 0..2 {
            d2[i] = (o[i] - y[i]) * o[i] * (1.0 - o[i]);
        }
        let mut d1 = [0.0; 3];
        for j in 0..3 {
            d1[j] = (self.w2[0][j] * d2[0] + self.w2[1][j] * d2[1]) * h[j] * (1.0 - h[j]);
        }

        for i in 0..2 {
            for j in 0..3 {
                self.w2[i][j] -= eta * d2[i] * h[j];
            }
            self.b2[i] -= eta * d2[i];
        }
        for j in 0..3 {
            for k in 0..2 {
                self.w1[j][k] -= eta * d1[j] * x[k];
            }
            self.b1[j] -= eta * d1[j];
        }
    }

    fn weights(&self) -> Vec<Array2<f64>> {
        vec![
            Array2::from_shape_fn((3, 2), |(j, k)| self.w1[j][k]),
            Array2::from_shape_fn((2, 3), |(i, j)| self.w2[i][j]),
        ]
    }

    fn biases(&self) -> Vec<Array2<f64>> {
        vec![
            Array2::from_shape_fn((3, 1), |(j, _)| self.b1[j]),
            Array2::from_shape_fn((2, 1), |(i, _)| self.b2[i]),
        ]
    }
}

fn assert_parameters_close(network: &Network, weights: &[Array2<f64>], biases: &[Array2<f64>]) {
    for (actual, expected) in network.weights().iter().zip(weights) {
        assert_eq!(actual.dim(), expected.dim());
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(a, e, epsilon = 1e-12);
        }
    }
    for (actual, expected) in network.biases().iter().zip(biases) {
        assert_eq!(actual.dim(), expected.dim());
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(a, e, epsilon = 1e-12);
        }
    }
}

fn fixed_network() -> Network {
    let weights = vec![
        array![[4.0, 3.0, -2.5], [1.5, 0.0, -1.0]],
        array![[1.0, -2.5], [2.0, 3.5], [0.0, 1.0], [-2.0, 1.5]],
    ];
    let biases = vec![array![[1.0], [-0.5]], array![[-3.0], [1.5], [0.0], [-1.5]]];
    Network::from_parameters(
        vec![3, 2, 4],
        &weights,
        &biases,
        CostFunction::Quadratic,
        ActivationFunction::Sigmoid,
    )
    .unwrap()
}

fn toy_dataset() -> Dataset {
    Dataset::from(vec![
        Instance::from_slices(&[1.0, -0.5, 3.0], Some(&[0.1, 0.8, 0.05, 0.05])),
        Instance::from_slices(&[0.0, 7.0, -0.5], Some(&[0.0, 0.0, 0.1, 0.9])),
        Instance::from_slices(&[1.5, -1.0, 5.0], Some(&[0.0, 0.9, 0.1, 0.0])),
        Instance::from_slices(&[0.0, 6.0, 0.0], Some(&[0.0, 0.1, 0.0, 0.9])),
        Instance::from_slices(&[0.5, 0.5, 0.5], Some(&[0.5, 0.0, 0.5, 0.0])),
    ])
}

fn features_of(dataset: &Dataset) -> Vec<Array2<f64>> {
    dataset.iter().map(|instance| instance.features().clone()).collect()
}

#[test]
fn one_epoch_matches_hand_computed_updates() {
    let mut reference = Reference {
        w1: [[0.5, -1.0], [1.5, 0.25], [-0.75, 2.0]],
        b1: [0.1, -0.2, 0.3],
        w2: [[1.0, -0.5, 0.75], [-1.25, 0.5, 2.0]],
        b2: [-0.1, 0.4],
    };
    let mut network = Network::from_parameters(
        vec![2, 3, 2],
        &reference.weights(),
        &reference.biases(),
        CostFunction::Quadratic,
        ActivationFunction::Sigmoid,
    )
    .unwrap();
    let initial_weights = network.weights().to_vec();

    let samples = [([1.0, 0.0], [1.0, 0.0]), ([0.5, -1.5], [0.0, 1.0])];
    let mut training_set: Dataset = samples
        .iter()
        .map(|(x, y)| Instance::from_slices(x, Some(y)))
        .collect();

    let eta = 0.5;
    network
        .train(&mut training_set, 1, eta, 1, &mut StdRng::seed_from_u64(42))
        .unwrap();

    // The training set is left in the order it was visited.
    for instance in training_set.iter() {
        let x = [instance.features()[[0, 0]], instance.features()[[1, 0]]];
        let &(_, y) = samples.iter().find(|(sx, _)| *sx == x).unwrap();
        reference.step(x, y, eta);
    }

    assert_ne!(network.weights(), &initial_weights[..]);
    assert_parameters_close(&network, &reference.weights(), &reference.biases());
}

#[test]
fn mini_batches_cover_the_shuffled_set_with_a_remainder() {
    let initial = fixed_network();
    let mut trained = initial.clone();
    let mut training_set = toy_dataset();

    trained
        .train(&mut training_set, 1, 0.3, 2, &mut StdRng::seed_from_u64(7))
        .unwrap();

    // Batches of two, two and one, each scaled by its own length.
    let mut expected = initial.clone();
    for (start, end) in [(0, 2), (2, 4), (4, 5)] {
        let batch = training_set.sub_set(start, end).unwrap();
        expected.update_parameters(&batch, 0.3, batch.len()).unwrap();
    }

    assert_eq!(trained.weights(), expected.weights());
    assert_eq!(trained.biases(), expected.biases());
}

#[test]
fn oversized_mini_batch_is_a_single_batch() {
    let initial = fixed_network();
    let mut trained = initial.clone();
    let mut training_set = toy_dataset();

    trained
        .train(&mut training_set, 1, 1.0, 50, &mut StdRng::seed_from_u64(3))
        .unwrap();

    let mut expected = initial.clone();
    expected.update_parameters(&training_set, 1.0, 5).unwrap();
    assert_eq!(trained.weights(), expected.weights());
}

#[test]
fn every_epoch_reshuffles_before_training() {
    let initial = fixed_network();
    let source = Dataset::random_labelled(3, 4, 12, &mut StdRng::seed_from_u64(19));
    let (learning_rate, mini_batch_size) = (0.3, 5);

    let mut trained = initial.clone();
    let mut training_set = source.clone();
    trained
        .train(&mut training_set, 2, learning_rate, mini_batch_size, &mut StdRng::seed_from_u64(11))
        .unwrap();

    // Replay both epochs by hand with an identically seeded generator.
    let mut rng = StdRng::seed_from_u64(11);
    let mut expected = initial.clone();
    let mut replayed = source.clone();
    let mut epoch_orders = Vec::new();
    for _ in 0..2 {
        replayed.shuffle(&mut rng);
        epoch_orders.push(features_of(&replayed));

        let len = replayed.len();
        for start in (0..len).step_by(mini_batch_size) {
            let batch = replayed.sub_set(start, (start + mini_batch_size).min(len)).unwrap();
            expected.update_parameters(&batch, learning_rate, batch.len()).unwrap();
        }
    }

    assert_ne!(epoch_orders[0], epoch_orders[1]);
    assert_eq!(features_of(&training_set), epoch_orders[1]);
    assert_eq!(trained.weights(), expected.weights());
    assert_eq!(trained.biases(), expected.biases());
}

#[test]
fn invalid_training_parameters_leave_the_network_untouched() {
    let untouched = fixed_network();
    let mut rng = StdRng::seed_from_u64(1);

    let cases: [(Dataset, usize, f64, usize); 5] = [
        (toy_dataset(), 0, 1.0, 1),
        (Dataset::new(), 1, 1.0, 1),
        (toy_dataset(), 1, 0.0, 1),
        (toy_dataset(), 1, -0.5, 1),
        (toy_dataset(), 1, 1.0, 0),
    ];
    for (mut training_set, epochs, learning_rate, mini_batch_size) in cases {
        let order = features_of(&training_set);
        let mut network = untouched.clone();

        let result = network.train(&mut training_set, epochs, learning_rate, mini_batch_size, &mut rng);

        assert!(matches!(result, Err(Error::NetworkInitialization(_))));
        assert_eq!(network.weights(), untouched.weights());
        assert_eq!(network.biases(), untouched.biases());
        assert_eq!(features_of(&training_set), order);
    }
}

#[test]
fn unlabelled_instances_are_skipped_within_a_batch() {
    let first = Instance::from_slices(&[1.0, -0.5, 3.0], Some(&[0.1, 0.8, 0.05, 0.05]));
    let second = Instance::from_slices(&[0.0, 7.0, -0.5], Some(&[0.0, 0.0, 0.1, 0.9]));
    let unlabelled = Instance::from_slices(&[2.0, -1.5, 1.0], None);

    let mut with_unlabelled = fixed_network();
    let applied = with_unlabelled
        .update_parameters(
            &Dataset::from(vec![first.clone(), unlabelled, second.clone()]),
            0.5,
            2,
        )
        .unwrap();

    let mut without_unlabelled = fixed_network();
    without_unlabelled
        .update_parameters(&Dataset::from(vec![first, second]), 0.5, 2)
        .unwrap();

    assert_eq!(applied, 2);
    assert_eq!(with_unlabelled.weights(), without_unlabelled.weights());
    assert_eq!(with_unlabelled.biases(), without_unlabelled.biases());
}

#[test]
fn training_on_only_unlabelled_instances_changes_nothing() {
    let untouched = fixed_network();
    let mut network = untouched.clone();
    let mut rng = StdRng::seed_from_u64(5);
    let mut training_set = Dataset::random_unlabelled(3, 6, &mut rng);

    network.train(&mut training_set, 2, 1.0, 4, &mut rng).unwrap();

    assert_eq!(network.weights(), untouched.weights());
}

#[test]
fn mismatched_instances_abort_training() {
    let mut network = fixed_network();
    let mut training_set = Dataset::from(vec![Instance::from_slices(&[1.0, 2.0], Some(&[0.0; 4]))]);

    let result = network.train(&mut training_set, 1, 1.0, 1, &mut StdRng::seed_from_u64(2));

    assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
}
