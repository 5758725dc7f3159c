//! Cardiovascular Risk Prediction Service
//!
//! Serves predictions from a pre-trained heart disease classifier. Raw
//! patient fields are mapped into the exact feature layout the model was
//! trained on before inference.

pub mod config;
pub mod feature_transformer;
pub mod models;
pub mod pipeline;
pub mod schema;
pub mod server;
pub mod types;

pub use config::AppConfig;
pub use feature_transformer::{FeatureMatrix, FeatureTransformer, TransformError};
pub use models::inference::{Classifier, InferenceService};
pub use pipeline::{Artifacts, PredictError, Predictor};
pub use types::{prediction::PredictionResult, record::RawRecord};
