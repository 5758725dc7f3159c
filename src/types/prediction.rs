//! Prediction output structures

use serde::{Deserialize, Serialize};

/// Probability at or above which a patient is classified positive.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Risk label shown to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLabel {
    High,
    Low,
}

impl RiskLabel {
    pub fn from_class(predicted_class: u8) -> Self {
        if predicted_class == 1 {
            RiskLabel::High
        } else {
            RiskLabel::Low
        }
    }
}

/// Classifier output for one record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionResult {
    /// Probability of the positive class (0.0 - 1.0)
    pub probability: f64,
    /// 1 when `probability >= DECISION_THRESHOLD`
    pub predicted_class: u8,
    pub risk_label: RiskLabel,
}

impl PredictionResult {
    /// Threshold a probability into a class and risk label.
    pub fn from_probability(probability: f64) -> Self {
        let probability = probability.clamp(0.0, 1.0);
        let predicted_class = u8::from(probability >= DECISION_THRESHOLD);

        Self {
            probability,
            predicted_class,
            risk_label: RiskLabel::from_class(predicted_class),
        }
    }

    /// Response form for the single-record endpoint.
    pub fn to_response(&self) -> SinglePredictionResponse {
        SinglePredictionResponse {
            prediction: self.predicted_class,
            probability: round4(self.probability),
            risk: self.risk_label,
        }
    }
}

/// JSON body returned by `POST /predict/single`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinglePredictionResponse {
    pub prediction: u8,
    pub probability: f64,
    pub risk: RiskLabel,
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
