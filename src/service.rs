use std::sync::Arc;

use ndarray::Array4;

use crate::classifier::Classifier;
use crate::errors::PredictError;
use crate::models::{WasteCategory, CATEGORIES};
use crate::preprocess::ImagePreprocessor;

/// Wraps a loaded classifier and maps its predictions onto [`CATEGORIES`].
///
/// Built once at startup and shared read-only between workers.
pub struct ClassificationService {
    classifier: Arc<dyn Classifier>,
    preprocessor: ImagePreprocessor,
}

impl ClassificationService {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        let (height, width) = classifier.input_size();
        Self {
            classifier,
            preprocessor: ImagePreprocessor::new(height, width),
        }
    }

    pub fn preprocessor(&self) -> &ImagePreprocessor {
        &self.preprocessor
    }

    pub fn classify(&self, tensor: &Array4<f32>) -> Result<&'static WasteCategory, PredictError> {
        let expected = self.preprocessor.tensor_shape();
        if tensor.shape() != &expected[..] {
            return Err(PredictError::ShapeMismatch {
                expected,
                actual: tensor.shape().to_vec(),
            });
        }

        let scores = self
            .classifier
            .predict(tensor)
            .map_err(PredictError::Inference)?;
        if scores.len() != CATEGORIES.len() {
            return Err(PredictError::inference(format!(
                "model returned {} scores for {} categories",
                scores.len(),
                CATEGORIES.len()
            )));
        }

        let index = argmax(&scores)
            .ok_or_else(|| PredictError::inference("model returned no comparable score"))?;
        Ok(&CATEGORIES[index])
    }

    /// Decodes, preprocesses and classifies one uploaded image.
    pub fn classify_image(&self, bytes: &[u8]) -> Result<&'static WasteCategory, PredictError> {
        let tensor = self.preprocessor.prepare_bytes(bytes)?;
        self.classify(&tensor)
    }
}

// Index of the highest score; the first one wins ties and NaN never wins.
fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((index, score)),
        }
    }
    best.map(|(index, _)| index)
}
