use crate::error::{Result, StockcastError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "stockcast.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// PageConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageLayout {
    Wide,
    Centered,
}

impl PageLayout {
    pub fn as_str(self) -> &'static str {
        match self {
            PageLayout::Wide => "wide",
            PageLayout::Centered => "centered",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_layout")]
    pub layout: PageLayout,
}

fn default_title() -> String {
    "Gambia AI Inventory Forecast".to_string()
}

fn default_layout() -> PageLayout {
    PageLayout::Wide
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            layout: default_layout(),
        }
    }
}

// ---------------------------------------------------------------------------
// ForecastConfig
// ---------------------------------------------------------------------------

/// Inclusive bounds and default for an integer form input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntRange {
    pub default: u32,
    pub min: u32,
    pub max: u32,
    #[serde(default = "default_step")]
    pub step: u32,
}

fn default_step() -> u32 {
    1
}

impl IntRange {
    pub fn contains(&self, value: u32) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Checks `value` against the bounds, naming the input in the error.
    pub fn check(&self, name: &str, value: u32) -> Result<u32> {
        if self.contains(value) {
            Ok(value)
        } else {
            Err(StockcastError::invalid(
                name,
                format!("{value} is outside {}..={}", self.min, self.max),
            ))
        }
    }
}

/// What the orchestrator does when one product cannot be forecast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the whole request.
    #[default]
    Abort,
    /// Keep the products that succeeded and report the rest.
    Partial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_horizon")]
    pub horizon_days: IntRange,
    #[serde(default = "default_margin")]
    pub margin_percent: IntRange,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Emit the seasonal model's in-sample fit ahead of the future points.
    #[serde(default)]
    pub include_history: bool,
}

fn default_horizon() -> IntRange {
    IntRange {
        default: 30,
        min: 7,
        max: 90,
        step: 1,
    }
}

fn default_margin() -> IntRange {
    IntRange {
        default: 20,
        min: 0,
        max: 200,
        step: 5,
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon_days: default_horizon(),
            margin_percent: default_margin(),
            failure_policy: FailurePolicy::default(),
            include_history: false,
        }
    }
}

// ---------------------------------------------------------------------------
// SeasonalConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Distinct dates needed before the seasonal model is attempted.
    #[serde(default = "default_min_history")]
    pub min_history_days: usize,
    #[serde(default = "default_window")]
    pub moving_average_window: usize,
}

fn default_true() -> bool {
    true
}

fn default_min_history() -> usize {
    7
}

fn default_window() -> usize {
    7
}

impl Default for SeasonalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_history_days: default_min_history(),
            moving_average_window: default_window(),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: usize,
}

fn default_port() -> u16 {
    3141
}

fn default_max_upload() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_upload_bytes: default_max_upload(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Process-wide settings, read once at startup and never mutated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub page: PageConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub seasonal: SeasonalConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, `./stockcast.yaml` is used
    /// when present and built-in defaults otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) if !p.exists() => return Err(StockcastError::ConfigNotFound(p.to_path_buf())),
            Some(p) => p.to_path_buf(),
            None => {
                let candidate = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !candidate.exists() {
                    tracing::debug!("no {DEFAULT_CONFIG_FILE} found, using defaults");
                    return Ok(Self::default());
                }
                candidate
            }
        };
        let data = std::fs::read_to_string(&path)?;
        let config = Self::from_yaml(&data)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(data)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Whether the seasonal model can be used in this process: compiled in
    /// and not switched off.
    pub fn seasonal_available(&self) -> bool {
        cfg!(feature = "seasonal") && self.seasonal.enabled
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        for (name, range) in [
            ("forecast.horizon_days", &self.forecast.horizon_days),
            ("forecast.margin_percent", &self.forecast.margin_percent),
        ] {
            if range.min > range.max {
                warnings.push(error(format!(
                    "{name}: min ({}) is greater than max ({})",
                    range.min, range.max
                )));
            } else if !range.contains(range.default) {
                warnings.push(error(format!(
                    "{name}: default ({}) is outside {}..={}",
                    range.default, range.min, range.max
                )));
            }
            if range.step == 0 {
                warnings.push(warning(format!("{name}: step is 0, the form will use 1")));
            }
        }

        if self.forecast.horizon_days.min == 0 {
            warnings.push(error(
                "forecast.horizon_days: min must be at least 1".to_string(),
            ));
        }

        if self.seasonal.moving_average_window == 0 {
            warnings.push(error(
                "seasonal.moving_average_window must be at least 1".to_string(),
            ));
        }

        if self.seasonal.enabled && !cfg!(feature = "seasonal") {
            warnings.push(warning(
                "seasonal.enabled is set but this build has no seasonal model; \
                 the moving average will be used"
                    .to_string(),
            ));
        }

        if self.seasonal.min_history_days < 3 {
            warnings.push(warning(format!(
                "seasonal.min_history_days is {}; very short series fit poorly",
                self.seasonal.min_history_days
            )));
        }

        if self.server.max_upload_bytes == 0 {
            warnings.push(error("server.max_upload_bytes must be positive".to_string()));
        }

        if self.page.title.trim().is_empty() {
            warnings.push(warning("page.title is empty".to_string()));
        }

        warnings
    }
}

fn warning(message: String) -> ConfigWarning {
    ConfigWarning {
        level: WarnLevel::Warning,
        message,
    }
}

fn error(message: String) -> ConfigWarning {
    ConfigWarning {
        level: WarnLevel::Error,
        message,
    }
}
