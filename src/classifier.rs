//! The classifier seam: a black box from an image tensor to class scores.

use std::path::{Path, PathBuf};

use log::info;
use ndarray::Array4;
use thiserror::Error;
use tract_onnx::prelude::*;
use tract_onnx::tract_hir::infer::{Factoid, GenericFactoid, ShapeFactoid};

use crate::errors::BoxError;
use crate::preprocess::CHANNELS;

pub trait Classifier: Send + Sync {
    /// `(height, width)` of the images the model was trained on.
    fn input_size(&self) -> (u32, u32);

    /// Runs a forward pass over a `(1, H, W, 3)` tensor and returns one score
    /// per class, in the model's output order.
    fn predict(&self, input: &Array4<f32>) -> Result<Vec<f32>, BoxError>;
}

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("failed to load model from {path}")]
    Tract {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("model input must be a rank 4 NHWC tensor with 3 channels, got shape {0}")]
    InputShape(String),

    #[error("model produces {found} scores but {expected} categories are known")]
    OutputSize { expected: usize, found: usize },
}

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// An ONNX image classifier executed with tract.
///
/// The plan is optimized once at load time and only ever run through `&self`,
/// so one instance is shared by every worker.
pub struct OnnxClassifier {
    plan: OnnxPlan,
    height: u32,
    width: u32,
}

impl OnnxClassifier {
    /// Loads an NHWC model, reading H and W from its declared input and pinning
    /// the batch dimension to 1, whether it was declared fixed, symbolic or not
    /// at all. `num_classes` is checked against the output when the optimized
    /// model has a concrete output shape.
    pub fn load<P: AsRef<Path>>(path: P, num_classes: usize) -> Result<Self, ModelLoadError> {
        let path = path.as_ref();
        let tract_err = |e: TractError| ModelLoadError::Tract {
            path: path.to_path_buf(),
            source: e.into(),
        };

        let model = tract_onnx::onnx().model_for_path(path).map_err(tract_err)?;

        let declared = &model.input_fact(0).map_err(tract_err)?.shape;
        let (height, width) = spatial_dims(declared)
            .ok_or_else(|| ModelLoadError::InputShape(format!("{declared:?}")))?;

        // The declared output still carries the free batch dimension; drop it
        // so it gets re-inferred from the pinned input.
        let input = tvec!(1, height as usize, width as usize, CHANNELS);
        let plan = model
            .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), input))
            .and_then(|m| m.with_output_fact(0, InferenceFact::default()))
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(tract_err)?;

        if let Some(found) = plan
            .model()
            .output_fact(0)
            .ok()
            .and_then(|fact| fact.shape.as_concrete().map(|dims| dims.iter().product::<usize>()))
        {
            if found != num_classes {
                return Err(ModelLoadError::OutputSize {
                    expected: num_classes,
                    found,
                });
            }
        }

        info!(
            "loaded model {} with input {}x{}x{}",
            path.display(),
            height,
            width,
            CHANNELS
        );
        Ok(Self {
            plan,
            height,
            width,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn input_size(&self) -> (u32, u32) {
        (self.height, self.width)
    }

    fn predict(&self, input: &Array4<f32>) -> Result<Vec<f32>, BoxError> {
        let data: Vec<f32> = input.iter().copied().collect();
        let tensor = Tensor::from_shape(input.shape(), &data)?;
        let outputs = self.plan.run(tvec!(tensor.into()))?;
        let scores = outputs[0].to_array_view::<f32>()?;
        Ok(scores.iter().copied().collect())
    }
}

// (_, H, W, 3) with concrete H and W; the batch dimension may be anything.
fn spatial_dims(shape: &ShapeFactoid) -> Option<(u32, u32)> {
    if shape.rank() != GenericFactoid::Only(4) {
        return None;
    }
    let concrete = |i: usize| -> Option<i64> { shape.dim(i)?.concretize()?.to_i64().ok() };
    let height = concrete(1).and_then(|h| u32::try_from(h).ok()).filter(|&h| h > 0)?;
    let width = concrete(2).and_then(|w| u32::try_from(w).ok()).filter(|&w| w > 0)?;
    (concrete(3)? == CHANNELS as i64).then_some((height, width))
}
