//! Additive trend + seasonality model.
//!
//! `y(t) = a + b·t + weekly(day) [+ yearly(day)] + ε`, with each seasonal
//! component expressed as a truncated Fourier series over the calendar day
//! number so that future days line up with the weekday they fall on. Daily
//! seasonality is not modelled; the series has one value per day.
//!
//! Coefficients are fitted by least squares on a max-abs-scaled target with
//! time scaled to `[0, 1]` over the history. The seasonal coefficients carry
//! a ridge penalty of `1 / prior_scale²`, which keeps the system solvable on
//! histories as short as a week. Uncertainty bounds come from the in-sample
//! residual spread, corrected for the number of fitted coefficients, and
//! widen with the distance past the last observation. When the history has
//! no more days than coefficients the fit can pass through every point, so
//! the spread of the observed values is used instead.

use super::{future_dates, ForecastModel, ModelError, ModelOutput};
use crate::series::DailySeries;
use crate::types::{ForecastMethod, ForecastPoint};
use chrono::{Datelike, NaiveDate};
use std::f64::consts::TAU;

const WEEKLY_PERIOD: f64 = 7.0;
const YEARLY_PERIOD: f64 = 365.25;
const PIVOT_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct SeasonalModel {
    pub weekly_order: usize,
    pub yearly_order: usize,
    /// History length at which the yearly component is switched on.
    pub yearly_min_span_days: i64,
    pub seasonality_prior_scale: f64,
    /// Normal quantile for the uncertainty interval (1.2816 = 80 %).
    pub interval_z: f64,
}

impl Default for SeasonalModel {
    fn default() -> Self {
        Self {
            weekly_order: 3,
            yearly_order: 10,
            yearly_min_span_days: 730,
            seasonality_prior_scale: 10.0,
            interval_z: 1.2816,
        }
    }
}

/// Time axis of one fit: day zero and the span used to scale `t`.
struct Axis {
    origin: NaiveDate,
    span: f64,
    yearly: bool,
}

impl SeasonalModel {
    fn features(&self, axis: &Axis, date: NaiveDate) -> Vec<f64> {
        let t = (date - axis.origin).num_days() as f64 / axis.span;
        let day = f64::from(date.num_days_from_ce());
        let mut row = vec![1.0, t];
        push_fourier(&mut row, day, WEEKLY_PERIOD, self.weekly_order);
        if axis.yearly {
            push_fourier(&mut row, day, YEARLY_PERIOD, self.yearly_order);
        }
        row
    }

    fn fit(&self, axis: &Axis, series: &DailySeries, scale: f64) -> Result<Vec<f64>, ModelError> {
        let rows: Vec<Vec<f64>> = series
            .points()
            .iter()
            .map(|(d, _)| self.features(axis, *d))
            .collect();
        let width = rows[0].len();

        let mut xtx = vec![vec![0.0; width]; width];
        let mut xty = vec![0.0; width];
        for (row, y) in rows.iter().zip(series.values()) {
            let y = y / scale;
            for i in 0..width {
                xty[i] += row[i] * y;
                for j in 0..width {
                    xtx[i][j] += row[i] * row[j];
                }
            }
        }

        // Trend terms (intercept, slope) are unpenalised.
        let penalty = 1.0 / self.seasonality_prior_scale.powi(2);
        for (i, row) in xtx.iter_mut().enumerate().skip(2) {
            row[i] += penalty;
        }

        solve(xtx, xty)
    }
}

fn push_fourier(row: &mut Vec<f64>, day: f64, period: f64, order: usize) {
    for k in 1..=order {
        let x = TAU * k as f64 * day / period;
        row.push(x.sin());
        row.push(x.cos());
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Sample standard deviation of the observed values (n - 1 denominator).
fn sample_spread(series: &DailySeries) -> f64 {
    let n = series.len() as f64;
    let mean = series.values().sum::<f64>() / n;
    let ss: f64 = series.values().map(|y| (y - mean).powi(2)).sum();
    (ss / (n - 1.0)).sqrt()
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>, ModelError> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .ok_or(ModelError::Singular)?;
        if a[pivot][col].abs() < PIVOT_EPSILON {
            return Err(ModelError::Singular);
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

impl ForecastModel for SeasonalModel {
    fn method(&self) -> ForecastMethod {
        ForecastMethod::Seasonal
    }

    fn fit_predict(
        &self,
        series: &DailySeries,
        horizon: usize,
        _today: NaiveDate,
    ) -> Result<ModelOutput, ModelError> {
        let (Some(origin), Some(last)) = (series.first_date(), series.last_date()) else {
            return Err(ModelError::InsufficientData {
                required: 2,
                actual: 0,
            });
        };
        if series.len() < 2 {
            return Err(ModelError::InsufficientData {
                required: 2,
                actual: series.len(),
            });
        }

        let future = future_dates(last, horizon)?;

        let axis = Axis {
            origin,
            span: series.span_days() as f64,
            yearly: series.span_days() >= self.yearly_min_span_days,
        };
        let max_abs = series.values().map(f64::abs).fold(0.0, f64::max);
        let scale = if max_abs > 0.0 { max_abs } else { 1.0 };

        let beta = self.fit(&axis, series, scale)?;
        let predict = |date: NaiveDate| dot(&self.features(&axis, date), &beta) * scale;

        let fitted: Vec<(NaiveDate, f64)> = series
            .points()
            .iter()
            .map(|(d, _)| (*d, predict(*d)))
            .collect();
        let n = fitted.len() as f64;
        let sse: f64 = fitted
            .iter()
            .zip(series.values())
            .map(|((_, yhat), y)| (y - yhat).powi(2))
            .sum();
        let sigma = if fitted.len() > beta.len() {
            (sse / (fitted.len() - beta.len()) as f64).sqrt()
        } else {
            sample_spread(series)
        };

        let band = |yhat: f64, steps: f64| {
            let width = self.interval_z * sigma * (1.0 + steps / n).sqrt();
            (yhat - width, yhat + width)
        };

        let mut points = Vec::with_capacity(fitted.len() + future.len());
        for (ds, yhat) in fitted {
            let (yhat_lower, yhat_upper) = band(yhat, 0.0);
            points.push(ForecastPoint {
                ds,
                yhat,
                yhat_lower,
                yhat_upper,
            });
        }
        for (h, ds) in future.into_iter().enumerate() {
            let yhat = predict(ds);
            let (yhat_lower, yhat_upper) = band(yhat, (h + 1) as f64);
            points.push(ForecastPoint {
                ds,
                yhat,
                yhat_lower,
                yhat_upper,
            });
        }

        if points
            .iter()
            .any(|p| !(p.yhat.is_finite() && p.yhat_lower.is_finite() && p.yhat_upper.is_finite()))
        {
            return Err(ModelError::NonFinite);
        }

        Ok(ModelOutput {
            points,
            history_len: series.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn series_from(values: impl IntoIterator<Item = f64>) -> DailySeries {
        DailySeries::from_observations(
            values
                .into_iter()
                .enumerate()
                .map(|(i, y)| (start() + Days::new(i as u64), y)),
        )
    }

    const WEEKDAY_EFFECT: [f64; 7] = [10.0, 0.0, -5.0, 0.0, 5.0, 30.0, -40.0];

    fn weekly_value(date: NaiveDate) -> f64 {
        100.0 + WEEKDAY_EFFECT[date.weekday().num_days_from_monday() as usize]
    }

    #[test]
    fn output_holds_history_then_horizon() {
        let series = series_from((0..14).map(|i| i as f64));
        let out = SeasonalModel::default()
            .fit_predict(&series, 5, start())
            .unwrap();
        assert_eq!(out.history_len, 14);
        assert_eq!(out.points.len(), 19);
        assert_eq!(out.points[0].ds, start());
        assert_eq!(out.future()[0].ds, start() + Days::new(14));
        assert_eq!(out.future()[4].ds, start() + Days::new(18));
    }

    #[test]
    fn recovers_weekly_pattern() {
        let series = DailySeries::from_observations(
            (0..56).map(|i| {
                let d = start() + Days::new(i);
                (d, weekly_value(d))
            }),
        );
        let out = SeasonalModel::default()
            .fit_predict(&series, 7, start())
            .unwrap();
        for p in out.future() {
            let expected = weekly_value(p.ds);
            assert!(
                (p.yhat - expected).abs() < 0.5,
                "{}: {} vs {}",
                p.ds,
                p.yhat,
                expected
            );
            assert!(p.yhat_lower <= p.yhat && p.yhat <= p.yhat_upper);
        }
    }

    #[test]
    fn extrapolates_linear_trend() {
        let series = series_from((0..28).map(|i| 10.0 + 2.0 * i as f64));
        let out = SeasonalModel::default()
            .fit_predict(&series, 3, start())
            .unwrap();
        let first = &out.future()[0];
        assert!((first.yhat - 66.0).abs() < 1.0, "got {}", first.yhat);
    }

    #[test]
    fn bands_widen_with_distance() {
        let noisy = (0..21).map(|i| 50.0 + if i % 3 == 0 { 6.0 } else { -3.0 });
        let out = SeasonalModel::default()
            .fit_predict(&series_from(noisy), 30, start())
            .unwrap();
        let future = out.future();
        let near = future[0].yhat_upper - future[0].yhat_lower;
        let far = future[29].yhat_upper - future[29].yhat_lower;
        assert!(far > near);
    }

    #[test]
    fn short_noisy_history_keeps_a_wide_band() {
        let values = [50.0, 62.0, 38.0, 55.0, 41.0, 60.0, 44.0];
        let out = SeasonalModel::default()
            .fit_predict(&series_from(values), 3, start())
            .unwrap();
        // Seven days against eight coefficients: the band falls back to the
        // spread of the values themselves (sample sd ≈ 9.4).
        let first = &out.future()[0];
        let half = (first.yhat_upper - first.yhat_lower) / 2.0;
        let expected = 1.2816 * (530.0_f64 / 6.0).sqrt() * (1.0 + 1.0 / 7.0_f64).sqrt();
        assert!((half - expected).abs() < 1e-6, "{half} vs {expected}");
    }

    #[test]
    fn residual_spread_counts_fitted_coefficients() {
        let noisy: Vec<f64> = (0..10)
            .map(|i| 50.0 + if i % 2 == 0 { 12.0 } else { -12.0 })
            .collect();
        let out = SeasonalModel::default()
            .fit_predict(&series_from(noisy), 1, start())
            .unwrap();
        let first = &out.future()[0];
        assert!(first.yhat_upper - first.yhat_lower > 1.0);
    }

    #[test]
    fn huge_horizon_is_out_of_range() {
        let err = SeasonalModel::default()
            .fit_predict(&series_from((0..14).map(f64::from)), usize::MAX, start())
            .unwrap_err();
        assert_eq!(err, ModelError::DateOutOfRange);
    }

    #[test]
    fn single_day_is_insufficient() {
        let err = SeasonalModel::default()
            .fit_predict(&series_from([5.0]), 3, start())
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::InsufficientData {
                required: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn all_zero_history_predicts_zero() {
        let out = SeasonalModel::default()
            .fit_predict(&series_from([0.0; 10]), 4, start())
            .unwrap();
        for p in out.future() {
            assert!(p.yhat.abs() < 1e-9);
        }
    }

    #[test]
    fn long_history_fits_yearly_component() {
        let values = (0..800).map(|i| {
            let d = start() + Days::new(i);
            200.0 + 50.0 * (TAU * f64::from(d.ordinal()) / YEARLY_PERIOD).sin()
        });
        let out = SeasonalModel::default()
            .fit_predict(&series_from(values), 30, start())
            .unwrap();
        assert_eq!(out.future().len(), 30);
        assert!(out.points.iter().all(|p| p.yhat.is_finite()));
    }

    #[test]
    fn solve_rejects_singular_system() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert_eq!(solve(a, vec![1.0, 2.0]).unwrap_err(), ModelError::Singular);
    }

    #[test]
    fn solve_small_system() {
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let x = solve(a, vec![3.0, 5.0]).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }
}
