//! Integration test: Server API endpoints

use std::sync::Arc;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use cardio_risk_service::models::scaler::ScalingModeSetting;
use cardio_risk_service::server::{create_router, AppState};
use cardio_risk_service::{schema, AppConfig, Artifacts, Classifier};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Scores a patient as `age / 100`, reading the unscaled age column.
struct AgeClassifier {
    width: usize,
}

impl Classifier for AgeClassifier {
    fn name(&self) -> &str {
        "age_stub"
    }

    fn input_width(&self) -> Option<usize> {
        Some(self.width)
    }

    fn predict_proba(&self, features: &[f32], rows: usize, width: usize) -> Result<Vec<f64>> {
        Ok((0..rows).map(|r| features[r * width] as f64 / 100.0).collect())
    }
}

fn test_app() -> axum::Router {
    let width = schema::expected_columns(None).len();
    let artifacts = Artifacts::with_classifier(
        Arc::new(AgeClassifier { width }),
        None,
        ScalingModeSetting::Auto,
    )
    .unwrap();
    create_router(Arc::new(AppState::new(AppConfig::default(), artifacts)))
}

fn unavailable_app() -> axum::Router {
    let artifacts = Artifacts::Unavailable {
        reason: "model file not found".to_string(),
    };
    create_router(Arc::new(AppState::new(AppConfig::default(), artifacts)))
}

fn patient(age: i64) -> Value {
    json!({
        "age": age,
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

fn json_request(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn upload_request(file_name: &str, contents: &[u8]) -> Request<Body> {
    let boundary = "cardio-test-boundary";
    let mut body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/predict/batch")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Single-sheet workbook; JSON numbers become numeric cells, strings text cells.
fn workbook(header: &[&str], rows: &[Value]) -> Vec<u8> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, name) in header.iter().enumerate() {
        sheet.write_string(0, col as u16, *name).unwrap();
    }
    for (r, row) in rows.iter().enumerate() {
        for (col, cell) in row.as_array().unwrap().iter().enumerate() {
            let (r, col) = (r as u32 + 1, col as u16);
            match cell {
                Value::Number(n) => sheet.write_number(r, col, n.as_f64().unwrap()),
                other => sheet.write_string(r, col, other.as_str().unwrap()),
            }
            .unwrap();
        }
    }

    workbook.save_to_buffer().unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let response = test_app()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model_loaded"], true);
}

#[tokio::test]
async fn test_metadata_endpoint() {
    let response = test_app()
        .oneshot(Request::builder().uri("/metadata").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["num_cols"].as_array().unwrap().len(), 5);
    assert_eq!(body["binary_cols"][0], "sex");
    assert_eq!(body["options"]["thalassemia"][2], "Reversable defect");

    let fields: Vec<&String> = body["options"].as_object().unwrap().keys().collect();
    assert_eq!(fields.first().map(|f| f.as_str()), Some("sex"));
    assert_eq!(fields.last().map(|f| f.as_str()), Some("thalassemia"));
}

#[tokio::test]
async fn test_predict_single_high_risk() {
    let response = test_app()
        .oneshot(json_request("/predict/single", &patient(67)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["prediction"], 1);
    assert_eq!(body["probability"], 0.67);
    assert_eq!(body["risk"], "High");
}

#[tokio::test]
async fn test_predict_single_low_risk() {
    let response = test_app()
        .oneshot(json_request("/predict/single", &patient(35)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["prediction"], 0);
    assert_eq!(body["risk"], "Low");
}

#[tokio::test]
async fn test_predict_single_unknown_category_accepted() {
    let mut input = patient(50);
    input["thalassemia"] = json!("Unknown");
    let response = test_app()
        .oneshot(json_request("/predict/single", &input))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_predict_single_malformed_body() {
    let mut input = patient(50);
    input.as_object_mut().unwrap().remove("age");
    let response = test_app()
        .oneshot(json_request("/predict/single", &input))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"], true);
}

#[tokio::test]
async fn test_predict_single_unavailable() {
    let response = unavailable_app()
        .oneshot(json_request("/predict/single", &patient(50)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_health_reports_unavailable_model() {
    let response = unavailable_app()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["model_loaded"], false);
}

#[tokio::test]
async fn test_predict_batch_csv() {
    let csv = "\
patient_id,age,sex,chest_pain_type,resting_blood_pressure,cholestoral,fasting_blood_sugar,rest_ecg,Max_heart_rate,exercise_induced_angina,oldpeak,slope,vessels_colored_by_flourosopy,thalassemia
p1,72,Male,Asymptomatic,140,260,Greater than 120 mg/ml,Normal,120,Yes,2.5,Flat,2,Reversable defect
p2,40,Female,Atypical angina,118,190,Lower than 120 mg/ml,Normal,170,No,0.0,Upsloping,0,Normal";

    let response = test_app()
        .oneshot(upload_request("patients.csv", csv.as_bytes()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);

    assert_eq!(results[0]["patient_id"], "p1");
    assert_eq!(results[0]["prediction"], 1);
    assert_eq!(results[0]["risk"], "High");
    assert_eq!(results[1]["patient_id"], "p2");
    assert_eq!(results[1]["prediction"], 0);

    let p = results[1]["probability"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&p));
}

#[tokio::test]
async fn test_predict_batch_xlsx() {
    let header = [
        "patient_id", "age", "sex", "chest_pain_type", "resting_blood_pressure", "cholestoral",
        "fasting_blood_sugar", "rest_ecg", "Max_heart_rate", "exercise_induced_angina",
        "oldpeak", "slope", "vessels_colored_by_flourosopy", "thalassemia",
    ];
    let rows = [
        json!(["p1", 72, "Male", "Asymptomatic", 140, 260, "Greater than 120 mg/ml", "Normal",
               120, "Yes", 2.5, "Flat", 2.0, "Reversable defect"]),
        json!(["p2", 40, "Female", "Atypical angina", 118, 190, "Lower than 120 mg/ml",
               "Normal", 170, "No", 0.0, "Upsloping", 0, "Normal"]),
    ];

    let response = test_app()
        .oneshot(upload_request("patients.xlsx", &workbook(&header, &rows)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);

    let keys: Vec<&String> = results[0].as_object().unwrap().keys().collect();
    assert_eq!(keys[0], "patient_id");
    assert_eq!(keys[header.len()], "probability");

    assert_eq!(results[0]["patient_id"], "p1");
    assert_eq!(results[0]["vessels_colored_by_flourosopy"], 2);
    assert_eq!(results[0]["prediction"], 1);
    assert_eq!(results[1]["patient_id"], "p2");
    assert_eq!(results[1]["risk"], "Low");
}

#[tokio::test]
async fn test_predict_batch_non_finite_cell_is_client_error() {
    let response = test_app()
        .oneshot(upload_request("patients.csv", b"age,oldpeak\n50,NaN"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_predict_single_whole_float_vessels() {
    let mut input = patient(50);
    input["vessels_colored_by_flourosopy"] = json!(2.0);
    let response = test_app()
        .oneshot(json_request("/predict/single", &input))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_predict_batch_rejects_extension() {
    let response = test_app()
        .oneshot(upload_request("patients.txt", b"age\n50"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_predict_batch_transform_error_is_client_error() {
    let response = test_app()
        .oneshot(upload_request("patients.csv", b"age,oldpeak\n50,steep"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_predict_batch_unavailable() {
    let response = unavailable_app()
        .oneshot(upload_request("patients.csv", b"age\n50"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_unknown_route() {
    let response = test_app()
        .oneshot(Request::builder().uri("/predict").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
