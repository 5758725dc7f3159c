//! Type definitions for the prediction service

pub mod prediction;
pub mod record;

pub use prediction::{PredictionResult, RiskLabel, SinglePredictionResponse};
pub use record::{FieldValue, HeartInput, RawRecord};
