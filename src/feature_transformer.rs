//! Feature transformation for heart disease model inference.
//!
//! Turns raw patient records into the numeric matrix the classifier was
//! trained on: binary substitution, drop-first one-hot expansion, alignment
//! to the expected column list and scaling.

use crate::models::scaler::{Scaler, ScalingMode, ScalingModeSetting};
use crate::schema::{self, BINARY_COLS, MULTI_CAT_COLS, NUM_COLS};
use crate::types::record::{FieldValue, RawRecord};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq)]
pub enum TransformError {
    #[error("row {row}: field '{field}' must be numeric, got '{value}'")]
    InvalidNumber {
        row: usize,
        field: String,
        value: String,
    },

    #[error("no records to transform")]
    Empty,
}

/// Row-major feature matrix aligned to a fixed column list.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Arc<[String]>,
    data: Vec<f64>,
    rows: usize,
}

impl FeatureMatrix {
    pub fn new(columns: Arc<[String]>, data: Vec<f64>, rows: usize) -> Self {
        debug_assert_eq!(data.len(), columns.len() * rows);
        Self {
            columns,
            data,
            rows,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn row(&self, index: usize) -> &[f64] {
        let width = self.width();
        &self.data[index * width..(index + 1) * width]
    }

    /// Flattened values in the precision the ONNX model takes.
    pub fn to_f32(&self) -> Vec<f32> {
        self.data.iter().map(|&v| v as f32).collect()
    }

    /// Reindex onto `columns`: shared columns are copied, new ones are zero,
    /// the rest are dropped.
    pub fn reindex(&self, columns: &[String]) -> FeatureMatrix {
        let positions: HashMap<&str, usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let mut data = Vec::with_capacity(columns.len() * self.rows);
        for r in 0..self.rows {
            let row = self.row(r);
            data.extend(
                columns
                    .iter()
                    .map(|c| positions.get(c.as_str()).map(|&i| row[i]).unwrap_or(0.0)),
            );
        }

        FeatureMatrix::new(columns.into(), data, self.rows)
    }
}

/// Transforms raw records into model input features.
///
/// Built once from the loaded artifacts and never mutated; the scaling mode
/// is resolved at construction so requests do not re-inspect the scaler.
#[derive(Debug)]
pub struct FeatureTransformer {
    columns: Arc<[String]>,
    index: HashMap<String, usize>,
    numeric_positions: Vec<usize>,
    scaler: Option<Scaler>,
    mode: ScalingMode,
}

impl FeatureTransformer {
    /// Build a transformer whose expected columns come from the scaler's
    /// recorded names, or from the schema registry when it has none.
    pub fn new(scaler: Option<Scaler>, setting: ScalingModeSetting) -> Self {
        let columns = schema::expected_columns(
            scaler
                .as_ref()
                .and_then(|s| s.feature_names_in.as_deref()),
        );
        Self::with_columns(columns, scaler, setting)
    }

    /// Build a transformer against an explicit column list.
    pub fn with_columns(
        columns: Vec<String>,
        scaler: Option<Scaler>,
        setting: ScalingModeSetting,
    ) -> Self {
        let index: HashMap<String, usize> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();

        let numeric_positions: Vec<usize> = NUM_COLS
            .iter()
            .filter_map(|c| index.get(*c).copied())
            .collect();

        let mut mode = ScalingMode::resolve(scaler.as_ref(), setting, columns.len(), NUM_COLS.len());
        if mode == ScalingMode::NumericOnly && numeric_positions.len() != NUM_COLS.len() {
            warn!(
                found = numeric_positions.len(),
                expected = NUM_COLS.len(),
                "Expected columns lack some numeric fields, skipping scaling"
            );
            mode = ScalingMode::Skip;
        }

        Self {
            columns: columns.into(),
            index,
            numeric_positions,
            scaler,
            mode,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn feature_count(&self) -> usize {
        self.columns.len()
    }

    pub fn scaling_mode(&self) -> ScalingMode {
        self.mode
    }

    /// Transform a batch of records into a scaled feature matrix.
    pub fn transform(&self, records: &[RawRecord]) -> Result<FeatureMatrix, TransformError> {
        if records.is_empty() {
            return Err(TransformError::Empty);
        }

        let mut data = Vec::with_capacity(records.len() * self.feature_count());
        for (row, record) in records.iter().enumerate() {
            let mut values = self.align(record, row)?;
            self.scale(&mut values);
            data.extend(values);
        }

        if self.mode == ScalingMode::Skip && self.scaler.is_some() {
            warn!(rows = records.len(), "Scaling skipped, features passed to the model unscaled");
        }

        Ok(FeatureMatrix::new(self.columns.clone(), data, records.len()))
    }

    /// Encode one record and align it to the expected columns, unscaled.
    pub fn align(&self, record: &RawRecord, row: usize) -> Result<Vec<f64>, TransformError> {
        let mut values = vec![0.0; self.feature_count()];

        for (field, value) in record.iter() {
            if BINARY_COLS.contains(&field) {
                if let (Some(&pos), Some(code)) = (self.index.get(field), encode_binary(field, value)) {
                    values[pos] = code;
                }
            } else if MULTI_CAT_COLS.contains(&field) {
                let Some(category) = value.as_category() else {
                    continue;
                };
                if schema::reference_category(field) == Some(category.as_str()) {
                    continue;
                }
                match self.index.get(&schema::one_hot_column(field, &category)) {
                    Some(&pos) => values[pos] = 1.0,
                    None => debug!(field, category = %category, "Unseen category, treated as reference"),
                }
            } else if let Some(&pos) = self.index.get(field) {
                values[pos] = match value {
                    FieldValue::Number(n) if n.is_finite() => *n,
                    FieldValue::Missing => 0.0,
                    FieldValue::Number(n) => {
                        return Err(TransformError::InvalidNumber {
                            row,
                            field: field.to_string(),
                            value: n.to_string(),
                        })
                    }
                    FieldValue::Text(s) => {
                        return Err(TransformError::InvalidNumber {
                            row,
                            field: field.to_string(),
                            value: s.clone(),
                        })
                    }
                };
            }
        }

        Ok(values)
    }

    fn scale(&self, values: &mut [f64]) {
        let Some(scaler) = &self.scaler else {
            return;
        };

        let outcome = match self.mode {
            ScalingMode::FullRow => scaler.transform(values),
            ScalingMode::NumericOnly => {
                let mut numeric: Vec<f64> =
                    self.numeric_positions.iter().map(|&i| values[i]).collect();
                scaler.transform(&mut numeric).map(|()| {
                    for (&i, v) in self.numeric_positions.iter().zip(numeric) {
                        values[i] = v;
                    }
                })
            }
            ScalingMode::Skip => Ok(()),
        };

        if let Err(e) = outcome {
            warn!(error = %e, mode = ?self.mode, "Scaling failed, row left unscaled");
        }
    }
}

/// Integer code for a binary field. Values already encoded as 0/1 pass
/// through; unknown labels yield `None` and align to 0.
fn encode_binary(field: &str, value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Number(n) if *n == 0.0 || *n == 1.0 => Some(*n),
        FieldValue::Text(s) => schema::binary_value(field, s.trim()).map(f64::from),
        _ => None,
    }
}
