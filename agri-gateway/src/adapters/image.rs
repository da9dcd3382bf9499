//! Disease classification from an uploaded leaf image

use image::{ImageReader, Limits};
use std::io::Cursor;
use tracing::debug;

use super::InferenceError;
use crate::labels::{disease_label, DISEASE_CLASS_COUNT};
use crate::models::{ImageClassifier, ModelError};
use crate::types::ImageTensor;

fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, InferenceError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| InferenceError::Decode(e.to_string()))
}

/// Decode uploaded bytes into the classifier's input tensor
///
/// Any format the `image` crate recognizes is accepted; alpha and
/// grayscale inputs are converted to RGB. With `expected` set to
/// `(height, width)`, the header is checked before any pixels are decoded
/// and other sizes are refused.
pub fn decode(bytes: &[u8], expected: Option<(usize, usize)>) -> Result<ImageTensor, InferenceError> {
    if bytes.is_empty() {
        return Err(InferenceError::Decode("empty upload".to_string()));
    }

    let (width, height) = reader(bytes)?
        .into_dimensions()
        .map_err(|e| InferenceError::Decode(e.to_string()))?;

    if let Some((expected_height, expected_width)) = expected {
        if height as usize != expected_height || width as usize != expected_width {
            return Err(ModelError::InvalidInput(format!(
                "image is {}x{} but the classifier expects {}x{}",
                width, height, expected_width, expected_height
            ))
            .into());
        }
    }

    let mut limits = Limits::default();
    limits.max_image_width = Some(width);
    limits.max_image_height = Some(height);

    let mut reader = reader(bytes)?;
    reader.limits(limits);
    let image = reader
        .decode()
        .map_err(|e| InferenceError::Decode(e.to_string()))?
        .to_rgb8();
    Ok(ImageTensor::from_rgb(&image))
}

/// Index of the largest logit, ignoring NaN
pub fn argmax(logits: &[f32]) -> Option<usize> {
    logits
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, f32)>, (ix, &v)| match best {
            Some((_, best_v)) if best_v >= v => best,
            _ => Some((ix, v)),
        })
        .map(|(ix, _)| ix)
}

/// Classify an uploaded image and return its disease label
pub fn classify(model: &dyn ImageClassifier, bytes: &[u8]) -> Result<String, InferenceError> {
    let tensor = decode(bytes, model.input_size())?;
    debug!(
        width = tensor.width(),
        height = tensor.height(),
        "Decoded image for disease classifier"
    );

    let logits = model.predict(&tensor)?;
    if logits.len() != DISEASE_CLASS_COUNT {
        return Err(ModelError::Output(format!(
            "classifier returned {} scores, label table has {}",
            logits.len(),
            DISEASE_CLASS_COUNT
        ))
        .into());
    }

    let index = argmax(&logits)
        .ok_or_else(|| ModelError::Output("classifier returned no finite scores".to_string()))?;
    let label = disease_label(index).ok_or_else(|| {
        ModelError::Output(format!("class index {} outside label table", index))
    })?;

    Ok(label.to_string())
}
