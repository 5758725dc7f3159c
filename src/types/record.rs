//! Raw patient records as received from clients

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// A single cell of a raw record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Missing,
}

fn parse_finite(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Whole numbers print without a fractional part: `2.0` → `"2"`.
fn number_label(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl FieldValue {
    /// Interpret a spreadsheet or CSV cell: finite numbers stay numbers,
    /// blanks are missing, anything else (including `NaN` and `inf`) is text.
    pub fn from_cell(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            FieldValue::Missing
        } else if let Some(n) = parse_finite(trimmed) {
            FieldValue::Number(n)
        } else {
            FieldValue::Text(trimmed.to_string())
        }
    }

    /// Categorical label of this value. Whole numbers print without a
    /// fractional part so `2.0` and `"2"` name the same category.
    pub fn as_category(&self) -> Option<String> {
        match self {
            FieldValue::Text(s) => match parse_finite(s.trim()) {
                Some(n) => Some(number_label(n)),
                None => Some(s.trim().to_string()),
            },
            FieldValue::Number(n) => Some(number_label(*n)),
            FieldValue::Missing => None,
        }
    }

    /// Convert to JSON for echoing the record back to the caller.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                serde_json::Value::from(*n as i64)
            }
            FieldValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
            FieldValue::Missing => serde_json::Value::Null,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// Field name to value mapping for one patient.
///
/// Columns keep their original order so batch responses can echo them back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Vec<(String, FieldValue)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing an existing value with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Builder-style variant of [`RawRecord::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Record as a JSON object in column order.
    pub fn to_json_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect()
    }
}

/// Body of `POST /predict/single`. Every field is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartInput {
    pub age: i64,
    pub sex: String,
    pub chest_pain_type: String,
    pub resting_blood_pressure: i64,
    pub cholestoral: i64,
    pub fasting_blood_sugar: String,
    pub rest_ecg: String,
    #[serde(rename = "Max_heart_rate")]
    pub max_heart_rate: i64,
    pub exercise_induced_angina: String,
    pub oldpeak: f64,
    pub slope: String,
    #[serde(deserialize_with = "string_or_number")]
    pub vessels_colored_by_flourosopy: String,
    pub thalassemia: String,
}

impl From<HeartInput> for RawRecord {
    fn from(input: HeartInput) -> Self {
        RawRecord::new()
            .with("age", input.age)
            .with("sex", input.sex)
            .with("chest_pain_type", input.chest_pain_type)
            .with("resting_blood_pressure", input.resting_blood_pressure)
            .with("cholestoral", input.cholestoral)
            .with("fasting_blood_sugar", input.fasting_blood_sugar)
            .with("rest_ecg", input.rest_ecg)
            .with("Max_heart_rate", input.max_heart_rate)
            .with("exercise_induced_angina", input.exercise_induced_angina)
            .with("oldpeak", input.oldpeak)
            .with("slope", input.slope)
            .with(
                "vessels_colored_by_flourosopy",
                input.vessels_colored_by_flourosopy,
            )
            .with("thalassemia", input.thalassemia)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(serde_json::Number),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => match n.as_f64() {
            Some(v) => number_label(v),
            None => n.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> serde_json::Value {
        serde_json::json!({
            "age": 50,
            "sex": "Male",
            "chest_pain_type": "Typical angina",
            "resting_blood_pressure": 120,
            "cholestoral": 200,
            "fasting_blood_sugar": "Lower than 120 mg/ml",
            "rest_ecg": "Normal",
            "Max_heart_rate": 150,
            "exercise_induced_angina": "No",
            "oldpeak": 1.0,
            "slope": "Upsloping",
            "vessels_colored_by_flourosopy": "0",
            "thalassemia": "Normal"
        })
    }

    #[test]
    fn test_heart_input_into_record() {
        let input: HeartInput = serde_json::from_value(sample_json()).unwrap();
        let record = RawRecord::from(input);

        assert_eq!(record.len(), 13);
        assert_eq!(record.get("Max_heart_rate"), Some(&FieldValue::Number(150.0)));
        assert_eq!(record.get("sex"), Some(&FieldValue::Text("Male".into())));
    }

    #[test]
    fn test_vessels_accepts_number() {
        let mut body = sample_json();
        body["vessels_colored_by_flourosopy"] = serde_json::json!(2);
        let input: HeartInput = serde_json::from_value(body).unwrap();
        assert_eq!(input.vessels_colored_by_flourosopy, "2");
    }

    #[test]
    fn test_vessels_whole_float_is_canonical() {
        let mut body = sample_json();
        body["vessels_colored_by_flourosopy"] = serde_json::json!(2.0);
        let input: HeartInput = serde_json::from_value(body).unwrap();
        assert_eq!(input.vessels_colored_by_flourosopy, "2");

        let record = RawRecord::from(input);
        assert_eq!(
            record.get("vessels_colored_by_flourosopy").and_then(FieldValue::as_category),
            Some("2".to_string())
        );
    }

    #[test]
    fn test_heart_input_rejects_missing_field() {
        let mut body = sample_json();
        body.as_object_mut().unwrap().remove("thalassemia");
        assert!(serde_json::from_value::<HeartInput>(body).is_err());
    }

    #[test]
    fn test_from_cell() {
        assert_eq!(FieldValue::from_cell(" 42 "), FieldValue::Number(42.0));
        assert_eq!(FieldValue::from_cell(""), FieldValue::Missing);
        assert_eq!(FieldValue::from_cell("Flat"), FieldValue::Text("Flat".into()));
        assert_eq!(FieldValue::from_cell("NaN"), FieldValue::Text("NaN".into()));
        assert_eq!(FieldValue::from_cell("-inf"), FieldValue::Text("-inf".into()));
    }

    #[test]
    fn test_as_category_normalizes_whole_numbers() {
        assert_eq!(FieldValue::Number(2.0).as_category().as_deref(), Some("2"));
        assert_eq!(FieldValue::Number(2.5).as_category().as_deref(), Some("2.5"));
        assert_eq!(FieldValue::Text("2.0".into()).as_category().as_deref(), Some("2"));
        assert_eq!(FieldValue::Text(" Flat ".into()).as_category().as_deref(), Some("Flat"));
        assert_eq!(FieldValue::Missing.as_category(), None);
    }

    #[test]
    fn test_insert_replaces_existing() {
        let mut record = RawRecord::new().with("age", 40_i64);
        record.insert("age", 41_i64);
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("age"), Some(&FieldValue::Number(41.0)));
    }
}
