use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use flate2::read::GzDecoder;
use itertools::Itertools;
use ndarray::{Array, Array2};
use tracing::info;

use crate::dataset::{Dataset, Instance};
use crate::error::{Error, Result};

const LABEL_MAGIC: u32 = 2049;
const IMAGE_MAGIC: u32 = 2051;
const NUM_DIGITS: usize = 10;

/// Reads an IDX label file and its matching IDX image file (the MNIST distribution format) into
/// a dataset. Paths ending in `.gz` are decompressed on the fly.
///
/// Every instance holds the image as a [rows*columns x 1] column of pixels scaled to [0, 1] and
/// a one-hot [10 x 1] label column.
pub fn read_mnist(label_path: impl AsRef<Path>, image_path: impl AsRef<Path>) -> Result<Dataset> {
    info!(
        labels = %label_path.as_ref().display(),
        images = %image_path.as_ref().display(),
        "reading MNIST dataset"
    );
    let label_bytes = read_bytes(label_path.as_ref())?;
    let image_bytes = read_bytes(image_path.as_ref())?;
    parse_idx(&label_bytes, &image_bytes)
}

/// Parses already loaded IDX label and image bytes.
pub fn parse_idx(label_bytes: &[u8], image_bytes: &[u8]) -> Result<Dataset> {
    // The label header is two big-endian u32s: the magic number and the number of labels. The
    // image header adds the number of rows and columns per image.
    let label_header = read_header(label_bytes, 2, "label")?;
    let image_header = read_header(image_bytes, 4, "image")?;

    if label_header[0] != LABEL_MAGIC {
        return Err(Error::DatasetInitialization(format!(
            "label file has wrong magic number {} (should be {LABEL_MAGIC})",
            label_header[0]
        )));
    }
    if image_header[0] != IMAGE_MAGIC {
        return Err(Error::DatasetInitialization(format!(
            "image file has wrong magic number {} (should be {IMAGE_MAGIC})",
            image_header[0]
        )));
    }

    // Both files must describe the same number of instances, as the n-th label belongs to the
    // n-th image.
    let labels = label_header[1] as usize;
    let images = image_header[1] as usize;
    if labels != images {
        return Err(Error::DatasetInitialization(format!(
            "image file contains {images} entries but label file contains {labels}"
        )));
    }

    // Every image is rows * columns bytes, one byte per pixel, stored row by row straight after
    // the 16 header bytes. The labels are one byte each straight after the 8 header bytes. Check
    // that both files actually hold that many bytes before slicing into them.
    let pixels = image_header[2] as usize * image_header[3] as usize;
    let image_len = images.checked_mul(pixels).unwrap_or(usize::MAX);
    let label_data = &label_bytes[8..];
    let image_data = &image_bytes[16..];
    if label_data.len() < labels || pixels == 0 || image_data.len() < image_len {
        return Err(Error::DatasetInitialization(format!(
            "expected {labels} labels and {images} images of {pixels} pixels, found {} label \
             bytes and {} image bytes",
            label_data.len(),
            image_data.len()
        )));
    }

    // Chunk the image bytes into one image each and pair every image with its label byte.
    let mut dataset = Dataset::new();
    for (read, (image_chunk, &digit)) in image_data[..image_len]
        .iter()
        .chunks(pixels)
        .into_iter()
        .zip(&label_data[..labels])
        .enumerate()
    {
        let digit = usize::from(digit);
        if digit >= NUM_DIGITS {
            return Err(Error::DatasetInitialization(format!(
                "label {digit} of instance {read} is not a digit"
            )));
        }

        // Scale each pixel from 0..=255 down to [0, 1]. Collecting single-element arrays and
        // converting the Vec turns the image into a [pixels x 1] column in one go.
        let features: Array2<f64> = image_chunk
            .map(|&value| [f64::from(value) / 255.0])
            .collect::<Vec<_>>()
            .into();
        dataset.push(Instance::new(features, one_hot(digit)));

        if (read + 1) % 10000 == 0 {
            info!(read = read + 1, total = labels, "reading instances");
        }
    }

    info!(instances = dataset.len(), "completed reading dataset");
    Ok(dataset)
}

/// Keeps, in order, up to `max_per_digit` instances labelled `first` and up to `max_per_digit`
/// labelled `second`. Unlabelled instances are ignored.
pub fn digit_pair_subset(
    dataset: &Dataset,
    first: usize,
    second: usize,
    max_per_digit: usize,
) -> Dataset {
    let mut first_count = 0;
    let mut second_count = 0;
    let mut subset = Dataset::new();

    for instance in dataset.shared() {
        if first_count >= max_per_digit && second_count >= max_per_digit {
            break;
        }
        let Ok(labels) = instance.labels() else {
            continue;
        };
        let digit = crate::evaluation::argmax(labels);
        if digit == Some(first) && first_count < max_per_digit {
            subset.push_shared(Arc::clone(instance));
            first_count += 1;
        } else if digit == Some(second) && second_count < max_per_digit {
            subset.push_shared(Arc::clone(instance));
            second_count += 1;
        }
    }
    subset
}

/// Renders a feature column as rows of shaded blocks, `columns` pixels per row.
pub fn ascii_preview(instance: &Instance, columns: usize) -> String {
    let mut preview = String::new();
    for (index, &pixel) in instance.features().iter().enumerate() {
        if index > 0 && columns > 0 && index % columns == 0 {
            preview.push('\n');
        }
        preview.push(match pixel {
            p if p < 0.2 => ' ',
            p if p < 0.4 => '░',
            p if p < 0.6 => '▒',
            p if p < 0.8 => '▓',
            _ => '█',
        });
    }
    if let Some(digit) = instance.labels().ok().and_then(crate::evaluation::argmax) {
        preview.push_str(&format!("\nAnswer: {digit}"));
    }
    preview
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut bytes = Vec::new();
    if path.extension().is_some_and(|extension| extension == "gz") {
        GzDecoder::new(file).read_to_end(&mut bytes)?;
    } else {
        file.read_to_end(&mut bytes)?;
    }
    Ok(bytes)
}

fn read_header(bytes: &[u8], fields: usize, kind: &str) -> Result<Vec<u32>> {
    if bytes.len() < fields * 4 {
        return Err(Error::DatasetInitialization(format!(
            "{kind} file is too short for its header ({} bytes)",
            bytes.len()
        )));
    }
    Ok(bytes[..fields * 4]
        .chunks_exact(4)
        .map(|chunk| u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn one_hot(digit: usize) -> Array2<f64> {
    Array::from_shape_fn((NUM_DIGITS, 1), |(i, _)| if i == digit { 1.0 } else { 0.0 })
}
