//! Application state management

use crate::config::AppConfig;
use crate::pipeline::Artifacts;
use chrono::{DateTime, Utc};

/// Application state shared across handlers.
///
/// Built once at startup and never mutated afterwards.
pub struct AppState {
    pub config: AppConfig,
    pub artifacts: Artifacts,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, artifacts: Artifacts) -> Self {
        Self {
            config,
            artifacts,
            started_at: Utc::now(),
        }
    }

    /// Load artifacts named by `config` and build the state around them.
    pub fn load(config: AppConfig) -> Self {
        let artifacts = Artifacts::load(&config.artifacts);
        Self::new(config, artifacts)
    }

    pub fn uptime_secs(&self) -> i64 {
        Utc::now().signed_duration_since(self.started_at).num_seconds()
    }
}
