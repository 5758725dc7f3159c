//! Classifier inference for heart disease risk

use crate::feature_transformer::FeatureMatrix;
use crate::models::loader::{LoadedModel, ModelLoader};
use crate::types::prediction::PredictionResult;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// A binary classifier producing positive-class probabilities.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    /// Feature width the model was exported with, if it declares one.
    fn input_width(&self) -> Option<usize>;

    /// Positive-class probability for each row of a row-major
    /// `[rows, width]` feature block.
    fn predict_proba(&self, features: &[f32], rows: usize, width: usize) -> Result<Vec<f64>>;
}

/// Keras network exported to ONNX, run through ONNX Runtime
pub struct OnnxClassifier {
    name: String,
    input_width: Option<usize>,
    /// `Session::run` needs exclusive access
    model: RwLock<LoadedModel>,
}

impl OnnxClassifier {
    pub fn load<P: AsRef<Path>>(path: P, onnx_threads: usize) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model")
            .to_string();

        let loader = ModelLoader::with_threads(onnx_threads)?;
        let model = loader.load_model(path, &name)?;

        Ok(Self {
            name,
            input_width: model.input_width,
            model: RwLock::new(model),
        })
    }

    fn run_model(model: &mut LoadedModel, features: &[f32], rows: usize, width: usize) -> Result<Vec<f64>> {
        use ort::value::Tensor;

        let shape = vec![rows as i64, width as i64];
        let input_tensor =
            Tensor::from_array((shape, features.to_vec())).context("Failed to create input tensor")?;

        let outputs = model
            .session
            .run(ort::inputs![model.input_name.as_str() => input_tensor])?;

        let output = outputs
            .get(model.output_name.as_str())
            .context(format!("Model output '{}' missing", model.output_name))?;
        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .context("Model output is not a float tensor")?;
        let dims: Vec<i64> = shape.iter().copied().collect();

        probabilities_from_tensor(&dims, data, rows)
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_width(&self) -> Option<usize> {
        self.input_width
    }

    fn predict_proba(&self, features: &[f32], rows: usize, width: usize) -> Result<Vec<f64>> {
        let mut model = self
            .model
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Self::run_model(&mut model, features, rows, width)
    }
}

/// Read per-row probabilities from a `[rows]`, `[rows, 1]` (sigmoid) or
/// `[rows, 2]` (softmax, class 1 taken) output tensor.
fn probabilities_from_tensor(dims: &[i64], data: &[f32], rows: usize) -> Result<Vec<f64>> {
    let columns = match dims {
        [n] if *n as usize == rows => 1,
        [n, c] if *n as usize == rows && *c >= 1 => *c as usize,
        _ => anyhow::bail!("Unexpected output shape {:?} for {} rows", dims, rows),
    };

    if data.len() < rows * columns {
        anyhow::bail!("Output holds {} values, expected {}", data.len(), rows * columns);
    }

    let class_index = if columns >= 2 { 1 } else { 0 };
    Ok((0..rows)
        .map(|r| data[r * columns + class_index] as f64)
        .collect())
}

/// Runs the classifier over aligned feature matrices.
pub struct InferenceService {
    classifier: Arc<dyn Classifier>,
}

impl InferenceService {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    pub fn model_name(&self) -> &str {
        self.classifier.name()
    }

    pub fn input_width(&self) -> Option<usize> {
        self.classifier.input_width()
    }

    /// Predict every row of `matrix`.
    pub fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<PredictionResult>> {
        if let Some(expected) = self.classifier.input_width() {
            if expected != matrix.width() {
                anyhow::bail!(
                    "Model expects {} features, transformer produced {}",
                    expected,
                    matrix.width()
                );
            }
        }

        let probabilities =
            self.classifier
                .predict_proba(&matrix.to_f32(), matrix.rows(), matrix.width())?;

        if probabilities.len() != matrix.rows() {
            anyhow::bail!(
                "Model returned {} probabilities for {} rows",
                probabilities.len(),
                matrix.rows()
            );
        }

        let results = probabilities
            .into_iter()
            .enumerate()
            .map(|(row, p)| {
                if !p.is_finite() {
                    anyhow::bail!("Model returned non-finite probability for row {}", row);
                }
                Ok(PredictionResult::from_probability(p))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            model = %self.classifier.name(),
            rows = results.len(),
            "Inference complete"
        );

        Ok(results)
    }
}
