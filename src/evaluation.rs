use ndarray::{Array2, Zip};

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::network::Network;

/// Index of the largest entry, or `None` for an empty array.
pub fn argmax(values: &Array2<f64>) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(index, _)| index)
}

/// Runs the network on every labelled instance of `dataset`, returning the predictions and the
/// matching gold labels in dataset order.
pub fn predict_labelled(
    network: &Network,
    dataset: &Dataset,
) -> Result<(Vec<Array2<f64>>, Vec<Array2<f64>>)> {
    let mut predictions = Vec::with_capacity(dataset.len());
    let mut golds = Vec::with_capacity(dataset.len());
    for instance in dataset.iter().filter(|instance| instance.is_labelled()) {
        predictions.push(network.feed_forward(instance.features())?);
        golds.push(instance.labels()?.to_owned());
    }
    Ok((predictions, golds))
}

/// Fraction of predictions whose largest entry sits at the same index as the gold label's.
pub fn accuracy(predictions: &[Array2<f64>], golds: &[Array2<f64>]) -> Result<f64> {
    check_lengths(predictions, golds)?;

    let correct = predictions
        .iter()
        .zip(golds)
        .filter(|(prediction, gold)| argmax(prediction) == argmax(gold))
        .count();
    Ok(correct as f64 / predictions.len() as f64)
}

/// Mean cosine similarity between predictions and gold labels. Pairs where either vector has a
/// zero norm have no defined angle and are left out of the mean.
pub fn average_cosine(predictions: &[Array2<f64>], golds: &[Array2<f64>]) -> Result<f64> {
    check_lengths(predictions, golds)?;

    let mut total = 0.0;
    let mut counted = 0;
    for (prediction, gold) in predictions.iter().zip(golds) {
        if prediction.ncols() != 1 || prediction.dim() != gold.dim() {
            return Err(Error::Evaluation(format!(
                "prediction {:?} and gold label {:?} are not matching column vectors",
                prediction.dim(),
                gold.dim()
            )));
        }
        let norms = norm(prediction) * norm(gold);
        if norms == 0.0 {
            continue;
        }
        let dot = Zip::from(prediction)
            .and(gold)
            .fold(0.0, |acc, &p, &g| acc + p * g);
        total += dot / norms;
        counted += 1;
    }

    if counted == 0 {
        return Err(Error::Evaluation(
            "every prediction or gold label has a zero norm".to_string(),
        ));
    }
    Ok(total / counted as f64)
}

fn norm(values: &Array2<f64>) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}

fn check_lengths(predictions: &[Array2<f64>], golds: &[Array2<f64>]) -> Result<()> {
    if predictions.is_empty() || predictions.len() != golds.len() {
        return Err(Error::Evaluation(format!(
            "{} predictions and {} gold labels",
            predictions.len(),
            golds.len()
        )));
    }
    Ok(())
}
