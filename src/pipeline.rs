//! Prediction pipeline: raw records in, predictions out.
//!
//! Owns the artifacts loaded at startup. When they cannot be loaded the
//! pipeline is explicitly unavailable and every prediction fails; there is no
//! substitute output.

use crate::config::ArtifactsConfig;
use crate::feature_transformer::{FeatureTransformer, TransformError};
use crate::models::inference::{Classifier, InferenceService, OnnxClassifier};
use crate::models::scaler::{Scaler, ScalingModeSetting};
use crate::types::prediction::PredictionResult;
use crate::types::record::RawRecord;
use anyhow::Result;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("Preprocessing error: {0}")]
    Transform(#[from] TransformError),

    #[error("Model and scaler not loaded, service unavailable: {0}")]
    Unavailable(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Transformer and classifier built from one consistent set of artifacts.
pub struct Predictor {
    transformer: FeatureTransformer,
    inference: InferenceService,
}

impl Predictor {
    /// Pair a transformer with a classifier, checking the classifier's
    /// declared input width against the transformer's columns.
    pub fn new(transformer: FeatureTransformer, classifier: Arc<dyn Classifier>) -> Result<Self> {
        if let Some(width) = classifier.input_width() {
            if width != transformer.feature_count() {
                anyhow::bail!(
                    "Model '{}' expects {} features but the schema has {} columns",
                    classifier.name(),
                    width,
                    transformer.feature_count()
                );
            }
        }

        Ok(Self {
            transformer,
            inference: InferenceService::new(classifier),
        })
    }

    /// Load the scaler and ONNX model named by the configuration.
    pub fn load(config: &ArtifactsConfig) -> Result<Self> {
        let scaler = Scaler::load(config.scaler_path())?;
        let transformer = FeatureTransformer::new(Some(scaler), config.scaling_mode);
        let classifier = OnnxClassifier::load(config.model_path(), config.onnx_threads)?;

        let predictor = Self::new(transformer, Arc::new(classifier))?;
        info!(
            model = %predictor.inference.model_name(),
            features = predictor.transformer.feature_count(),
            scaling_mode = ?predictor.transformer.scaling_mode(),
            "Predictor ready"
        );
        Ok(predictor)
    }

    pub fn transformer(&self) -> &FeatureTransformer {
        &self.transformer
    }

    pub fn model_name(&self) -> &str {
        self.inference.model_name()
    }

    /// Transform and score a batch of records, one result per record.
    pub fn predict(&self, records: &[RawRecord]) -> Result<Vec<PredictionResult>, PredictError> {
        let matrix = self.transformer.transform(records)?;
        self.inference
            .predict(&matrix)
            .map_err(|e| PredictError::Inference(format!("{:#}", e)))
    }
}

/// Artifact state shared by every request handler.
pub enum Artifacts {
    Ready(Predictor),
    Unavailable { reason: String },
}

impl Artifacts {
    /// Load artifacts, capturing a failure as the unavailable state.
    pub fn load(config: &ArtifactsConfig) -> Self {
        match Predictor::load(config) {
            Ok(predictor) => Artifacts::Ready(predictor),
            Err(e) => {
                let reason = format!("{:#}", e);
                error!(error = %reason, "Failed to load model artifacts, predictions disabled");
                Artifacts::Unavailable { reason }
            }
        }
    }

    /// Artifacts built around an in-process classifier and the derived schema.
    pub fn with_classifier(
        classifier: Arc<dyn Classifier>,
        scaler: Option<Scaler>,
        setting: ScalingModeSetting,
    ) -> Result<Self> {
        let transformer = FeatureTransformer::new(scaler, setting);
        Ok(Artifacts::Ready(Predictor::new(transformer, classifier)?))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Artifacts::Ready(_))
    }

    pub fn predictor(&self) -> Result<&Predictor, PredictError> {
        match self {
            Artifacts::Ready(predictor) => Ok(predictor),
            Artifacts::Unavailable { reason } => Err(PredictError::Unavailable(reason.clone())),
        }
    }

    pub fn predict(&self, records: &[RawRecord]) -> Result<Vec<PredictionResult>, PredictError> {
        self.predictor()?.predict(records)
    }
}
