//! Pre-fitted feature scaler and scaling mode selection

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error, PartialEq)]
pub enum ScalerError {
    #[error("scaler expects {expected} features, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },
}

/// Fitted parameters, exported from the training notebook as JSON.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScalerParams {
    /// `(x - mean) / scale`
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// `x * scale + min`
    MinMax { min: Vec<f64>, scale: Vec<f64> },
}

/// A fitted scaler with its optional recorded input schema.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Scaler {
    #[serde(flatten)]
    pub params: ScalerParams,
    /// Declared input width
    #[serde(default)]
    pub n_features_in: Option<usize>,
    /// Column names the scaler was fit on
    #[serde(default)]
    pub feature_names_in: Option<Vec<String>>,
}

impl Scaler {
    /// Load a scaler from its JSON export
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .context(format!("Failed to read scaler from {:?}", path))?;
        let scaler: Scaler = serde_json::from_str(&raw)
            .context(format!("Failed to parse scaler from {:?}", path))?;

        info!(
            path = %path.display(),
            width = scaler.width(),
            declared_width = ?scaler.n_features_in,
            named_columns = scaler.feature_names_in.as_ref().map(Vec::len),
            "Scaler loaded"
        );

        Ok(scaler)
    }

    /// Number of parameters, i.e. the only width `transform` accepts.
    pub fn width(&self) -> usize {
        match &self.params {
            ScalerParams::Standard { scale, .. } | ScalerParams::MinMax { scale, .. } => {
                scale.len()
            }
        }
    }

    pub fn accepts(&self, width: usize) -> bool {
        self.width() == width
    }

    /// Scale `values` in place.
    pub fn transform(&self, values: &mut [f64]) -> Result<(), ScalerError> {
        if !self.accepts(values.len()) {
            return Err(ScalerError::WidthMismatch {
                expected: self.width(),
                actual: values.len(),
            });
        }

        match &self.params {
            ScalerParams::Standard { mean, scale } => {
                for ((v, m), s) in values.iter_mut().zip(mean).zip(scale) {
                    *v = (*v - m) / non_zero(*s);
                }
            }
            ScalerParams::MinMax { min, scale } => {
                for ((v, m), s) in values.iter_mut().zip(min).zip(scale) {
                    *v = *v * s + m;
                }
            }
        }

        Ok(())
    }
}

// Constant features are fit with a zero scale; leave them centred but unscaled.
fn non_zero(scale: f64) -> f64 {
    if scale == 0.0 {
        1.0
    } else {
        scale
    }
}

/// Which part of an aligned row the scaler applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingMode {
    /// Scaler was fit on every aligned column
    FullRow,
    /// Scaler was fit on the numeric columns only
    NumericOnly,
    /// No usable scaler; rows pass through unscaled
    Skip,
}

/// Configured scaling mode; `Auto` resolves from the scaler's shape.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScalingModeSetting {
    #[default]
    Auto,
    FullRow,
    NumericOnly,
    None,
}

impl ScalingMode {
    /// Pick the branch from a declared scaler width.
    ///
    /// Pure: the same widths always select the same mode.
    pub fn select(declared_width: usize, aligned_width: usize, numeric_width: usize) -> Self {
        if declared_width == aligned_width {
            ScalingMode::FullRow
        } else if declared_width == numeric_width {
            ScalingMode::NumericOnly
        } else {
            ScalingMode::Skip
        }
    }

    /// Resolve the mode once for a loaded scaler.
    ///
    /// Without a declared width the numeric-only transform is tried first and
    /// the full row second. If neither fits, scaling is skipped.
    pub fn resolve(
        scaler: Option<&Scaler>,
        setting: ScalingModeSetting,
        aligned_width: usize,
        numeric_width: usize,
    ) -> Self {
        let Some(scaler) = scaler else {
            warn!("No scaler loaded, features will not be scaled");
            return ScalingMode::Skip;
        };

        let mode = match setting {
            ScalingModeSetting::FullRow => ScalingMode::FullRow,
            ScalingModeSetting::NumericOnly => ScalingMode::NumericOnly,
            ScalingModeSetting::None => ScalingMode::Skip,
            ScalingModeSetting::Auto => match scaler.n_features_in {
                Some(declared) => Self::select(declared, aligned_width, numeric_width),
                None if scaler.accepts(numeric_width) => ScalingMode::NumericOnly,
                None if scaler.accepts(aligned_width) => ScalingMode::FullRow,
                None => ScalingMode::Skip,
            },
        };

        let required = match mode {
            ScalingMode::FullRow => Some(aligned_width),
            ScalingMode::NumericOnly => Some(numeric_width),
            ScalingMode::Skip => None,
        };
        if let Some(required) = required {
            if !scaler.accepts(required) {
                warn!(
                    mode = ?mode,
                    scaler_width = scaler.width(),
                    required,
                    "Scaler parameters do not match scaling mode, skipping scaling"
                );
                return ScalingMode::Skip;
            }
        }

        if mode == ScalingMode::Skip {
            warn!(
                declared_width = ?scaler.n_features_in,
                scaler_width = scaler.width(),
                aligned_width,
                numeric_width,
                "Scaler shape matches neither the aligned nor the numeric columns, skipping scaling"
            );
        } else {
            info!(mode = ?mode, "Scaling mode resolved");
        }

        mode
    }
}
