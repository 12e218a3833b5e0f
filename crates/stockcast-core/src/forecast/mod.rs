//! Per-product forecasting.
//!
//! A [`Forecaster`] owns the strategies available to this process: the
//! moving-average fallback always, and the seasonal model when it was
//! compiled in and enabled. The choice between them is made per product
//! from the length of its daily series; a seasonal failure falls back to the
//! moving average.

pub mod moving_average;
#[cfg(feature = "seasonal")]
pub mod seasonal;

use crate::config::Config;
use crate::error::{Result, StockcastError};
use crate::series::DailySeries;
use crate::types::{ForecastMethod, ForecastPoint};
use chrono::{Days, NaiveDate};
use thiserror::Error;

pub use moving_average::MovingAverage;
#[cfg(feature = "seasonal")]
pub use seasonal::SeasonalModel;

// ---------------------------------------------------------------------------
// ModelError
// ---------------------------------------------------------------------------

/// Why a single strategy could not produce a forecast.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("insufficient data: need {required} points, have {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("design matrix is singular")]
    Singular,

    #[error("model produced non-finite values")]
    NonFinite,

    #[error("forecast date out of range")]
    DateOutOfRange,
}

// ---------------------------------------------------------------------------
// ForecastModel
// ---------------------------------------------------------------------------

/// Points produced by one strategy.
///
/// `points` holds `history_len` in-sample fitted points (oldest first)
/// followed by the future points.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub points: Vec<ForecastPoint>,
    pub history_len: usize,
}

impl ModelOutput {
    pub fn future(&self) -> &[ForecastPoint] {
        &self.points[self.history_len..]
    }
}

/// A forecasting strategy: fit on a daily series and predict `horizon` days
/// past its last date (or past `today` when the series is empty).
pub trait ForecastModel: Send + Sync {
    fn method(&self) -> ForecastMethod;

    fn fit_predict(
        &self,
        series: &DailySeries,
        horizon: usize,
        today: NaiveDate,
    ) -> std::result::Result<ModelOutput, ModelError>;
}

/// `start + 1 ..= start + horizon`, one date per day.
///
/// The last date is checked before anything is allocated, so an
/// unrepresentable horizon fails without building the earlier dates.
pub(crate) fn future_dates(
    start: NaiveDate,
    horizon: usize,
) -> std::result::Result<Vec<NaiveDate>, ModelError> {
    let days = u64::try_from(horizon).map_err(|_| ModelError::DateOutOfRange)?;
    start
        .checked_add_days(Days::new(days))
        .ok_or(ModelError::DateOutOfRange)?;
    (1..=days)
        .map(|h| {
            start
                .checked_add_days(Days::new(h))
                .ok_or(ModelError::DateOutOfRange)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Forecaster
// ---------------------------------------------------------------------------

/// One product's forecast and the strategy that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductForecast {
    pub method: ForecastMethod,
    pub points: Vec<ForecastPoint>,
}

pub struct Forecaster {
    seasonal: Option<Box<dyn ForecastModel>>,
    fallback: Box<dyn ForecastModel>,
    min_seasonal_history: usize,
    include_history: bool,
}

impl Forecaster {
    /// Build the strategies this process can use. Called once at startup.
    pub fn from_config(config: &Config) -> Self {
        let forecaster = Self::moving_average_only(config.seasonal.moving_average_window)
            .with_min_seasonal_history(config.seasonal.min_history_days)
            .with_history(config.forecast.include_history);
        #[cfg(feature = "seasonal")]
        let forecaster = if config.seasonal_available() {
            forecaster.with_seasonal(Box::new(SeasonalModel::default()))
        } else {
            forecaster
        };
        tracing::debug!(
            seasonal = forecaster.seasonal_available(),
            "forecast strategies resolved"
        );
        forecaster
    }

    pub fn moving_average_only(window: usize) -> Self {
        Self {
            seasonal: None,
            fallback: Box::new(MovingAverage::new(window)),
            min_seasonal_history: 7,
            include_history: false,
        }
    }

    pub fn with_seasonal(mut self, model: Box<dyn ForecastModel>) -> Self {
        self.seasonal = Some(model);
        self
    }

    pub fn with_min_seasonal_history(mut self, days: usize) -> Self {
        self.min_seasonal_history = days;
        self
    }

    pub fn with_history(mut self, include: bool) -> Self {
        self.include_history = include;
        self
    }

    pub fn seasonal_available(&self) -> bool {
        self.seasonal.is_some()
    }

    /// Forecast `horizon` days for one product from its (date, units) rows.
    pub fn forecast<I>(
        &self,
        product: &str,
        observations: I,
        horizon: usize,
        today: NaiveDate,
    ) -> Result<ProductForecast>
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        if horizon == 0 {
            return Err(StockcastError::invalid("horizon_days", "must be at least 1"));
        }
        let series = DailySeries::from_observations(observations);

        if let Some(model) = self.seasonal_candidate(&series) {
            match model.fit_predict(&series, horizon, today) {
                Ok(output) => {
                    tracing::debug!(product, days = series.len(), "seasonal forecast");
                    return Ok(ProductForecast {
                        method: model.method(),
                        points: self.select_points(output),
                    });
                }
                Err(e) => {
                    tracing::warn!(product, error = %e, "seasonal model failed, using moving average");
                }
            }
        }

        let output = self
            .fallback
            .fit_predict(&series, horizon, today)
            .map_err(|e| StockcastError::ForecastFailure {
                product: product.to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!(product, days = series.len(), "moving-average forecast");
        Ok(ProductForecast {
            method: self.fallback.method(),
            points: self.select_points(output),
        })
    }

    fn seasonal_candidate(&self, series: &DailySeries) -> Option<&dyn ForecastModel> {
        self.seasonal
            .as_deref()
            .filter(|_| series.len() >= self.min_seasonal_history)
    }

    fn select_points(&self, output: ModelOutput) -> Vec<ForecastPoint> {
        if self.include_history {
            output.points
        } else {
            let history = output.history_len;
            output.points.into_iter().skip(history).collect()
        }
    }
}
