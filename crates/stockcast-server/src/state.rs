use std::sync::Arc;
use stockcast_core::config::Config;
use stockcast_core::forecast::Forecaster;

/// Shared application state passed to all route handlers.
///
/// Both fields are built once at startup and only read afterwards.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub forecaster: Arc<Forecaster>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let forecaster = Forecaster::from_config(&config);
        Self {
            config: Arc::new(config),
            forecaster: Arc::new(forecaster),
        }
    }
}
