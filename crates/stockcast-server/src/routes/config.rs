use axum::extract::State;
use axum::Json;
use serde::Serialize;
use stockcast_core::config::{FailurePolicy, IntRange, PageConfig};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ConfigView {
    pub page: PageConfig,
    pub horizon_days: IntRange,
    pub margin_percent: IntRange,
    pub failure_policy: FailurePolicy,
    pub seasonal_available: bool,
    pub max_upload_bytes: usize,
}

/// GET /api/config: page settings and input limits the form is built from.
pub async fn get_config(State(app): State<AppState>) -> Json<ConfigView> {
    let config = &app.config;
    Json(ConfigView {
        page: config.page.clone(),
        horizon_days: config.forecast.horizon_days,
        margin_percent: config.forecast.margin_percent,
        failure_policy: config.forecast.failure_policy,
        seasonal_available: app.forecaster.seasonal_available(),
        max_upload_bytes: config.server.max_upload_bytes,
    })
}
