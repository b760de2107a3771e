use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use feedforward_playground::evaluation::{accuracy, average_cosine, predict_labelled};
use feedforward_playground::mnist::{ascii_preview, digit_pair_subset, read_mnist};
use feedforward_playground::{ActivationFunction, CostFunction, Dataset, Instance, Network};
use ndarray_rand::rand::{SeedableRng, rngs::StdRng};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "feedforward-playground")]
#[command(about = "Train small feedforward networks with stochastic gradient descent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: Level,

    /// Seed for weight initialization and shuffling; random when omitted
    #[arg(long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on four hand-made instances and predict a fifth
    Dummy {
        #[command(flatten)]
        functions: FunctionArgs,

        #[arg(long, value_delimiter = ',', default_value = "3,5,4")]
        layers: Vec<usize>,

        #[arg(long, default_value_t = 100)]
        epochs: usize,

        #[arg(long, default_value_t = 3.0)]
        learning_rate: f64,

        #[arg(long, default_value_t = 2)]
        mini_batch_size: usize,
    },

    /// Train on the MNIST training set and report accuracy on the test set
    Mnist {
        #[command(flatten)]
        data: MnistPaths,

        #[command(flatten)]
        functions: FunctionArgs,

        #[arg(long, value_delimiter = ',', default_value = "784,30,10")]
        layers: Vec<usize>,

        #[arg(long, default_value_t = 30)]
        epochs: usize,

        #[arg(long, default_value_t = 0.1)]
        learning_rate: f64,

        #[arg(long, default_value_t = 10)]
        mini_batch_size: usize,

        /// Only train on the first N training instances
        #[arg(long, default_value_t = 3000)]
        train_limit: usize,

        /// Print an ASCII rendering of the first training instance
        #[arg(long)]
        preview: bool,
    },

    /// Train and test on the images of two digits only
    MnistBinary {
        #[command(flatten)]
        data: MnistPaths,

        #[command(flatten)]
        functions: FunctionArgs,

        #[arg(long, value_delimiter = ',', default_value = "784,10,10")]
        layers: Vec<usize>,

        #[arg(long, default_value_t = 10)]
        epochs: usize,

        #[arg(long, default_value_t = 0.1)]
        learning_rate: f64,

        #[arg(long, default_value_t = 10)]
        mini_batch_size: usize,

        #[arg(long, value_delimiter = ',', default_value = "1,8")]
        digits: Vec<usize>,

        #[arg(long, default_value_t = 1000)]
        train_per_digit: usize,

        #[arg(long, default_value_t = 500)]
        test_per_digit: usize,
    },
}

#[derive(Args)]
struct FunctionArgs {
    #[arg(long, default_value_t = ActivationFunction::Sigmoid)]
    activation: ActivationFunction,

    #[arg(long, default_value_t = CostFunction::Quadratic)]
    cost: CostFunction,
}

#[derive(Args)]
struct MnistPaths {
    #[arg(long, default_value = "data/train-labels-idx1-ubyte.gz")]
    train_labels: PathBuf,

    #[arg(long, default_value = "data/train-images-idx3-ubyte.gz")]
    train_images: PathBuf,

    #[arg(long, default_value = "data/t10k-labels-idx1-ubyte.gz")]
    test_labels: PathBuf,

    #[arg(long, default_value = "data/t10k-images-idx3-ubyte.gz")]
    test_images: PathBuf,
}

impl MnistPaths {
    fn read(&self) -> Result<(Dataset, Dataset)> {
        let training_set = read_mnist(&self.train_labels, &self.train_images)
            .context("failed to read MNIST training set")?;
        let test_set = read_mnist(&self.test_labels, &self.test_images)
            .context("failed to read MNIST test set")?;
        Ok((training_set, test_set))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    match cli.command {
        Commands::Dummy {
            functions,
            layers,
            epochs,
            learning_rate,
            mini_batch_size,
        } => {
            let mut training_set = Dataset::from(vec![
                Instance::from_slices(&[1.0, -0.5, 3.0], Some(&[0.1, 0.8, 0.05, 0.05])),
                Instance::from_slices(&[0.0, 7.0, -0.5], Some(&[0.0, 0.0, 0.1, 0.9])),
                Instance::from_slices(&[1.5, -1.0, 5.0], Some(&[0.0, 0.9, 0.1, 0.0])),
                Instance::from_slices(&[0.0, 6.0, 0.0], Some(&[0.0, 0.1, 0.0, 0.9])),
            ]);
            let mut network =
                Network::with_rng(layers, functions.cost, functions.activation, &mut rng)?;
            network.train(
                &mut training_set,
                epochs,
                learning_rate,
                mini_batch_size,
                &mut rng,
            )?;

            let query = Instance::from_slices(&[0.0, 8.0, 0.5], None);
            let output = network.feed_forward(query.features())?;
            println!("Prediction for input instance:\n{output}");
        }
        Commands::Mnist {
            data,
            functions,
            layers,
            epochs,
            learning_rate,
            mini_batch_size,
            train_limit,
            preview,
        } => {
            let (training_set, test_set) = data.read()?;
            let mut training_set =
                training_set.sub_set(0, train_limit.min(training_set.len()))?;
            if preview {
                if let Some(instance) = training_set.get(0) {
                    println!("{}", ascii_preview(instance, 28));
                }
            }

            let mut network =
                Network::with_rng(layers, functions.cost, functions.activation, &mut rng)?;
            run_epochs(
                &mut network,
                &mut training_set,
                &test_set,
                epochs,
                learning_rate,
                mini_batch_size,
                &mut rng,
            )?;
            report(&network, &test_set)?;
        }
        Commands::MnistBinary {
            data,
            functions,
            layers,
            epochs,
            learning_rate,
            mini_batch_size,
            digits,
            train_per_digit,
            test_per_digit,
        } => {
            let &[first, second] = digits.as_slice() else {
                anyhow::bail!("expected exactly two digits, got {digits:?}");
            };
            let (training_set, test_set) = data.read()?;
            let mut training_set =
                digit_pair_subset(&training_set, first, second, train_per_digit);
            let test_set = digit_pair_subset(&test_set, first, second, test_per_digit);
            info!(
                training = training_set.len(),
                test = test_set.len(),
                first,
                second,
                "selected digit pair"
            );

            let mut network =
                Network::with_rng(layers, functions.cost, functions.activation, &mut rng)?;
            run_epochs(
                &mut network,
                &mut training_set,
                &test_set,
                epochs,
                learning_rate,
                mini_batch_size,
                &mut rng,
            )?;
            report(&network, &test_set)?;
        }
    }

    Ok(())
}

// Trains one epoch at a time so progress on the test set can be printed after each pass.
fn run_epochs(
    network: &mut Network,
    training_set: &mut Dataset,
    test_set: &Dataset,
    epochs: usize,
    learning_rate: f64,
    mini_batch_size: usize,
    rng: &mut StdRng,
) -> Result<()> {
    for epoch in 0..epochs {
        network.train(training_set, 1, learning_rate, mini_batch_size, rng)?;

        let (predictions, golds) = predict_labelled(network, test_set)?;
        let correct = accuracy(&predictions, &golds)? * predictions.len() as f64;
        println!("Epoch {epoch}: {} / {}", correct.round(), predictions.len());
    }
    Ok(())
}

fn report(network: &Network, test_set: &Dataset) -> Result<()> {
    let (predictions, golds) = predict_labelled(network, test_set)?;
    println!("Test accuracy: {}", accuracy(&predictions, &golds)?);
    println!("Average cosine: {}", average_cosine(&predictions, &golds)?);
    Ok(())
}
