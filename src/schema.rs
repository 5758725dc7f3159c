//! Column schema for the heart disease model.
//!
//! Holds the fixed column groups the model was trained on, the binary value
//! maps, and the dropdown options offered to clients. The expected feature
//! layout is derived from these tables unless the fitted scaler recorded its
//! own column names.

use lazy_static::lazy_static;
use serde::Serialize;

/// Numeric features, passed through (and scaled) as-is.
pub const NUM_COLS: [&str; 5] = [
    "age",
    "resting_blood_pressure",
    "cholestoral",
    "Max_heart_rate",
    "oldpeak",
];

/// Two-valued categorical features, substituted by an integer.
pub const BINARY_COLS: [&str; 3] = ["sex", "exercise_induced_angina", "fasting_blood_sugar"];

/// Multi-valued categorical features, one-hot expanded with drop-first.
pub const MULTI_CAT_COLS: [&str; 5] = [
    "chest_pain_type",
    "rest_ecg",
    "slope",
    "vessels_colored_by_flourosopy",
    "thalassemia",
];

const BINARY_MAPPING: [(&str, &[(&str, u8)]); 3] = [
    ("sex", &[("Male", 1), ("Female", 0)]),
    ("exercise_induced_angina", &[("Yes", 1), ("No", 0)]),
    (
        "fasting_blood_sugar",
        &[("Greater than 120 mg/ml", 1), ("Lower than 120 mg/ml", 0)],
    ),
];

const DROPDOWN_OPTIONS: [(&str, &[&str]); 8] = [
    ("sex", &["Male", "Female"]),
    (
        "chest_pain_type",
        &[
            "Typical angina",
            "Atypical angina",
            "Non-anginal pain",
            "Asymptomatic",
        ],
    ),
    (
        "fasting_blood_sugar",
        &["Greater than 120 mg/ml", "Lower than 120 mg/ml"],
    ),
    (
        "rest_ecg",
        &["Normal", "ST-T wave abnormality", "Left ventricular hypertrophy"],
    ),
    ("exercise_induced_angina", &["Yes", "No"]),
    ("slope", &["Upsloping", "Flat", "Downsloping"]),
    ("vessels_colored_by_flourosopy", &["0", "1", "2", "3", "4"]),
    ("thalassemia", &["Normal", "Fixed defect", "Reversable defect"]),
];

lazy_static! {
    static ref DERIVED_COLUMNS: Vec<String> = derive_expected_columns();
}

/// Column groups and dropdown options, as served by `GET /metadata`.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaMetadata {
    pub num_cols: Vec<&'static str>,
    pub binary_cols: Vec<&'static str>,
    pub multi_cat_cols: Vec<&'static str>,
    /// Field → options, in form order.
    pub options: serde_json::Map<String, serde_json::Value>,
}

/// Describe the schema for client-side forms.
pub fn metadata() -> SchemaMetadata {
    SchemaMetadata {
        num_cols: NUM_COLS.to_vec(),
        binary_cols: BINARY_COLS.to_vec(),
        multi_cat_cols: MULTI_CAT_COLS.to_vec(),
        options: DROPDOWN_OPTIONS
            .iter()
            .map(|(field, opts)| (field.to_string(), serde_json::json!(opts)))
            .collect(),
    }
}

/// Ordered column names the transformed feature vector must match.
///
/// Names recorded on the fitted scaler win; otherwise the layout is derived
/// from the registry: numeric, then binary, then the drop-first one-hot
/// columns grouped by source field.
pub fn expected_columns(scaler_feature_names: Option<&[String]>) -> Vec<String> {
    match scaler_feature_names {
        Some(names) if !names.is_empty() => names.to_vec(),
        _ => DERIVED_COLUMNS.clone(),
    }
}

/// Permitted values for a categorical field.
pub fn options(field: &str) -> Option<&'static [&'static str]> {
    DROPDOWN_OPTIONS
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, opts)| *opts)
}

/// Integer code for a binary field value, `None` when the value is unknown.
pub fn binary_value(field: &str, value: &str) -> Option<u8> {
    BINARY_MAPPING
        .iter()
        .find(|(name, _)| *name == field)
        .and_then(|(_, mapping)| mapping.iter().find(|(label, _)| *label == value))
        .map(|(_, code)| *code)
}

/// The alphabetically-first option of a multi-category field. It has no
/// indicator column and is encoded as all zeros.
pub fn reference_category(field: &str) -> Option<&'static str> {
    options(field).and_then(|opts| opts.iter().copied().min())
}

/// Name of the indicator column for `field == option`.
pub fn one_hot_column(field: &str, option: &str) -> String {
    format!("{}_{}", field, option)
}

fn derive_expected_columns() -> Vec<String> {
    let mut columns: Vec<String> = NUM_COLS
        .iter()
        .chain(BINARY_COLS.iter())
        .map(|c| c.to_string())
        .collect();

    for field in MULTI_CAT_COLS {
        let mut opts = options(field).map(<[&str]>::to_vec).unwrap_or_default();
        opts.sort_unstable();
        columns.extend(opts.iter().skip(1).map(|opt| one_hot_column(field, opt)));
    }

    columns
}
