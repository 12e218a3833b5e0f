use super::{future_dates, ForecastModel, ModelError, ModelOutput};
use crate::series::DailySeries;
use crate::types::{ForecastMethod, ForecastPoint};
use chrono::NaiveDate;

const LOWER_FACTOR: f64 = 0.8;
const UPPER_FACTOR: f64 = 1.2;

/// Flat projection of the recent daily mean with a fixed ±20 % band.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: usize,
}

impl MovingAverage {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }
}

impl Default for MovingAverage {
    fn default() -> Self {
        Self::new(7)
    }
}

impl ForecastModel for MovingAverage {
    fn method(&self) -> ForecastMethod {
        ForecastMethod::MovingAverage
    }

    fn fit_predict(
        &self,
        series: &DailySeries,
        horizon: usize,
        today: NaiveDate,
    ) -> Result<ModelOutput, ModelError> {
        let mean = series.tail_mean(self.window);
        let start = series.last_date().unwrap_or(today);

        let points = future_dates(start, horizon)?
            .into_iter()
            .map(|ds| ForecastPoint {
                ds,
                yhat: mean,
                yhat_lower: (mean * LOWER_FACTOR).max(0.0),
                yhat_upper: mean * UPPER_FACTOR,
            })
            .collect();

        Ok(ModelOutput {
            points,
            history_len: 0,
        })
    }
}
