use ndarray::Array2;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Bad layer sizes, parameter shapes, or gradient descent hyperparameters.
    #[error("network initialization failed: {0}")]
    NetworkInitialization(String),

    #[error("labels are not set")]
    NoLabel,

    #[error("dimension mismatch in {context}: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        context: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("dataset initialization failed: {0}")]
    DatasetInitialization(String),

    #[error("invalid evaluation input: {0}")]
    Evaluation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// Fails with DimensionMismatch unless the array has exactly the expected (rows, columns).
pub(crate) fn ensure_shape(
    context: &'static str,
    expected: (usize, usize),
    array: &Array2<f64>,
) -> Result<()> {
    let found = array.dim();
    if found != expected {
        return Err(Error::DimensionMismatch {
            context,
            expected,
            found,
        });
    }
    Ok(())
}
