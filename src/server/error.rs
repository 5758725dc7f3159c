//! Error types for the server

use crate::pipeline::PredictError;
use crate::server::upload::InputFormatError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    InputFormat(#[from] InputFormatError),

    #[error(transparent)]
    Predict(#[from] PredictError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::InputFormat(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ServerError::Predict(e @ PredictError::Transform(_)) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ServerError::Predict(e @ PredictError::Unavailable(reason)) => {
                tracing::warn!(detail = %reason, "Prediction requested while artifacts unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            ServerError::Predict(PredictError::Inference(msg)) => {
                tracing::error!(detail = %msg, "Inference error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Inference failed. Check server logs for details.".to_string(),
                )
            }
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "An internal error occurred".to_string())
            }
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
