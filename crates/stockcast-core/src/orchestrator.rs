use crate::config::{Config, FailurePolicy};
use crate::error::{Result, StockcastError};
use crate::forecast::Forecaster;
use crate::risk;
use crate::types::{AnnotatedForecastPoint, ForecastMethod, SalesTable};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request / report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct ForecastRequest {
    pub horizon_days: usize,
    pub margin_percent: f64,
    /// Processing date; forecasts for products without history start the day after.
    pub today: NaiveDate,
}

impl ForecastRequest {
    fn check(&self) -> Result<()> {
        if self.horizon_days == 0 {
            return Err(StockcastError::invalid("horizon_days", "must be at least 1"));
        }
        if !(self.margin_percent.is_finite() && self.margin_percent >= 0.0) {
            return Err(StockcastError::invalid(
                "margin",
                format!("{} must be a non-negative number", self.margin_percent),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub product: String,
    pub method: ForecastMethod,
    pub current_stock: f64,
    pub rows: usize,
    pub at_risk_days: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFailure {
    pub product: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForecastReport {
    pub rows: Vec<AnnotatedForecastPoint>,
    pub products: Vec<ProductSummary>,
    pub failures: Vec<ProductFailure>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs the forecaster and risk annotator over every product of a table.
pub struct Orchestrator<'a> {
    forecaster: &'a Forecaster,
    policy: FailurePolicy,
}

impl<'a> Orchestrator<'a> {
    pub fn new(forecaster: &'a Forecaster, policy: FailurePolicy) -> Self {
        Self { forecaster, policy }
    }

    pub fn from_config(forecaster: &'a Forecaster, config: &Config) -> Self {
        Self::new(forecaster, config.forecast.failure_policy)
    }

    /// Forecast every product in first-seen order and concatenate the results.
    pub fn run(&self, table: &SalesTable, request: &ForecastRequest) -> Result<ForecastReport> {
        request.check()?;

        let mut report = ForecastReport::default();
        for product in table.products() {
            match self.forecast_product(table, product, request) {
                Ok((rows, summary)) => {
                    report.rows.extend(rows);
                    report.products.push(summary);
                }
                Err(e) => match self.policy {
                    FailurePolicy::Abort => return Err(e),
                    FailurePolicy::Partial => {
                        tracing::warn!(product, error = %e, "skipping product");
                        report.failures.push(ProductFailure {
                            product: product.to_string(),
                            error: e.to_string(),
                        });
                    }
                },
            }
        }

        tracing::info!(
            products = report.products.len(),
            failed = report.failures.len(),
            rows = report.rows.len(),
            "forecast complete"
        );
        Ok(report)
    }

    fn forecast_product(
        &self,
        table: &SalesTable,
        product: &str,
        request: &ForecastRequest,
    ) -> Result<(Vec<AnnotatedForecastPoint>, ProductSummary)> {
        let rows: Vec<_> = table.rows_for(product).collect();
        let forecast = self.forecaster.forecast(
            product,
            rows.iter().map(|r| (r.date, r.units_sold)),
            request.horizon_days,
            request.today,
        )?;

        // Last row in upload order, not the latest date.
        let current_stock = rows.last().map(|r| r.current_stock).unwrap_or(0.0);
        let annotated = risk::annotate(
            &forecast.points,
            request.margin_percent,
            current_stock,
            product,
        )?;

        let summary = ProductSummary {
            product: product.to_string(),
            method: forecast.method,
            current_stock,
            rows: annotated.len(),
            at_risk_days: annotated.iter().filter(|p| p.stockout_risk).count(),
        };
        Ok((annotated, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::{ForecastModel, ModelError, ModelOutput};
    use crate::series::DailySeries;
    use crate::types::SalesRecord;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn record(product: &str, m: u32, d: u32, units: f64, stock: f64) -> SalesRecord {
        SalesRecord {
            date: date(m, d),
            product: product.to_string(),
            units_sold: units,
            current_stock: stock,
        }
    }

    fn request(horizon_days: usize) -> ForecastRequest {
        ForecastRequest {
            horizon_days,
            margin_percent: 20.0,
            today: date(6, 1),
        }
    }

    fn table() -> SalesTable {
        let mut records = Vec::new();
        for d in 1..=10 {
            records.push(record("rice", 1, d, 10.0 + d as f64, 100.0 - d as f64));
        }
        records.push(record("oil", 1, 3, 4.0, 9.0));
        records.push(record("oil", 1, 1, 2.0, 3.0));
        SalesTable {
            records,
            ..Default::default()
        }
    }

    #[test]
    fn every_product_gets_horizon_rows() {
        let forecaster = Forecaster::from_config(&Config::default());
        let report = Orchestrator::new(&forecaster, FailurePolicy::Abort)
            .run(&table(), &request(14))
            .unwrap();
        assert_eq!(report.rows.len(), 28);
        for product in ["rice", "oil"] {
            assert_eq!(
                report.rows.iter().filter(|r| r.product == product).count(),
                14
            );
        }
        assert!(report.failures.is_empty());
    }

    #[test]
    fn products_are_concatenated_in_first_seen_order() {
        let forecaster = Forecaster::moving_average_only(7);
        let report = Orchestrator::new(&forecaster, FailurePolicy::Abort)
            .run(&table(), &request(3))
            .unwrap();
        let products: Vec<_> = report.rows.iter().map(|r| r.product.as_str()).collect();
        assert_eq!(products, vec!["rice", "rice", "rice", "oil", "oil", "oil"]);
        assert_eq!(report.rows[0].ds, date(1, 11));
        assert_eq!(report.rows[3].ds, date(1, 4));
    }

    #[test]
    fn stock_comes_from_last_row_in_upload_order() {
        let forecaster = Forecaster::moving_average_only(7);
        let report = Orchestrator::new(&forecaster, FailurePolicy::Abort)
            .run(&table(), &request(3))
            .unwrap();
        let oil = report.products.iter().find(|p| p.product == "oil").unwrap();
        // Rows for oil arrive as Jan 3 (stock 9) then Jan 1 (stock 3).
        assert_eq!(oil.current_stock, 3.0);
        let rice = report.products.iter().find(|p| p.product == "rice").unwrap();
        assert_eq!(rice.current_stock, 90.0);
        assert_eq!(rice.method, ForecastMethod::MovingAverage);
    }

    #[test]
    fn risk_summary_counts_flagged_days() {
        let forecaster = Forecaster::moving_average_only(7);
        let report = Orchestrator::new(&forecaster, FailurePolicy::Abort)
            .run(&table(), &request(5))
            .unwrap();
        let oil = report.products.iter().find(|p| p.product == "oil").unwrap();
        // mean 3, suggested round(3.6) = 4 > stock 3 on every day.
        assert_eq!(oil.at_risk_days, 5);
        let rice = report.products.iter().find(|p| p.product == "rice").unwrap();
        assert_eq!(rice.at_risk_days, 0);
    }

    #[test]
    fn empty_table_yields_empty_report() {
        let forecaster = Forecaster::moving_average_only(7);
        let report = Orchestrator::new(&forecaster, FailurePolicy::Abort)
            .run(&SalesTable::default(), &request(7))
            .unwrap();
        assert!(report.rows.is_empty());
        assert!(report.products.is_empty());
    }

    #[test]
    fn invalid_request_fails_before_forecasting() {
        let forecaster = Forecaster::moving_average_only(7);
        let orchestrator = Orchestrator::new(&forecaster, FailurePolicy::Partial);
        let mut req = request(7);
        req.margin_percent = -1.0;
        assert!(matches!(
            orchestrator.run(&table(), &req).unwrap_err(),
            StockcastError::InvalidParameter { .. }
        ));
        assert!(orchestrator.run(&table(), &request(0)).is_err());
    }

    fn overflow_table() -> SalesTable {
        SalesTable {
            records: vec![
                record("rice", 1, 1, 5.0, 1.0),
                SalesRecord {
                    date: NaiveDate::MAX,
                    product: "far-future".to_string(),
                    units_sold: 1.0,
                    current_stock: 0.0,
                },
                record("oil", 1, 1, 5.0, 1.0),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn abort_policy_fails_the_request() {
        let forecaster = Forecaster::moving_average_only(7);
        let err = Orchestrator::new(&forecaster, FailurePolicy::Abort)
            .run(&overflow_table(), &request(3))
            .unwrap_err();
        match err {
            StockcastError::ForecastFailure { product, .. } => assert_eq!(product, "far-future"),
            other => panic!("expected ForecastFailure, got {other:?}"),
        }
    }

    #[test]
    fn partial_policy_keeps_other_products() {
        let forecaster = Forecaster::moving_average_only(7);
        let report = Orchestrator::new(&forecaster, FailurePolicy::Partial)
            .run(&overflow_table(), &request(3))
            .unwrap();
        assert_eq!(report.rows.len(), 6);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].product, "far-future");
        assert_eq!(report.products.len(), 2);
    }

    /// Seasonal stand-in that panics if it is ever consulted.
    struct Unreachable;

    impl ForecastModel for Unreachable {
        fn method(&self) -> ForecastMethod {
            ForecastMethod::Seasonal
        }

        fn fit_predict(
            &self,
            _series: &DailySeries,
            _horizon: usize,
            _today: NaiveDate,
        ) -> std::result::Result<ModelOutput, ModelError> {
            panic!("seasonal model should not be consulted for short histories")
        }
    }

    #[test]
    fn short_histories_never_reach_seasonal_model() {
        let forecaster = Forecaster::moving_average_only(7).with_seasonal(Box::new(Unreachable));
        let short = SalesTable {
            records: (1..=6).map(|d| record("rice", 2, d, 1.0, 0.0)).collect(),
            ..Default::default()
        };
        let report = Orchestrator::new(&forecaster, FailurePolicy::Abort)
            .run(&short, &request(7))
            .unwrap();
        assert_eq!(report.rows.len(), 7);
    }
}
