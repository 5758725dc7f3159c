//! Cardiovascular Risk Prediction Service - Main Entry Point
//!
//! Loads the scaler and classifier once, then serves predictions over HTTP.

use anyhow::Result;
use cardio_risk_service::{
    config::{AppConfig, LoggingConfig, DEFAULT_CONFIG_PATH},
    server::{run_server, AppState},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let (config, config_path) = match std::env::var("CARDIO_CONFIG") {
        Ok(path) => (AppConfig::load_from_path(&path)?, path),
        Err(_) => (AppConfig::load()?, DEFAULT_CONFIG_PATH.to_string()),
    };

    init_logging(&config.logging)?;
    info!(path = %config_path, "Configuration loaded successfully");
    info!(
        models_dir = %config.artifacts.models_dir,
        model_file = %config.artifacts.model_file,
        scaler_file = %config.artifacts.scaler_file,
        scaling_mode = ?config.artifacts.scaling_mode,
        "Loading model artifacts"
    );

    let state = AppState::load(config);
    if let Ok(predictor) = state.artifacts.predictor() {
        info!(
            model = %predictor.model_name(),
            features = predictor.transformer().feature_count(),
            "Feature transformer initialized"
        );
    }

    run_server(state).await
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!(
            "cardio_risk_service={},tower_http=info",
            logging.level
        ))
    })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
    Ok(())
}
