use crate::error::{Result, StockcastError};
use crate::types::{AnnotatedForecastPoint, ForecastPoint};

/// Recommended stock for one day: `yhat` grown by `margin_percent`, rounded
/// half-to-even.
///
/// A negative `yhat` is scaled the same way, so a larger margin moves it
/// further below zero.
pub fn suggested_inventory(yhat: f64, margin_percent: f64) -> i64 {
    (yhat * (1.0 + margin_percent / 100.0)).round_ties_even() as i64
}

/// Apply the safety margin to each forecast day and flag the days whose
/// recommended stock exceeds `current_stock`.
pub fn annotate(
    points: &[ForecastPoint],
    margin_percent: f64,
    current_stock: f64,
    product: &str,
) -> Result<Vec<AnnotatedForecastPoint>> {
    if !(margin_percent.is_finite() && margin_percent >= 0.0) {
        return Err(StockcastError::invalid(
            "margin",
            format!("{margin_percent} must be a non-negative number"),
        ));
    }

    Ok(points
        .iter()
        .map(|p| {
            let suggested = suggested_inventory(p.yhat, margin_percent);
            AnnotatedForecastPoint {
                ds: p.ds,
                yhat: p.yhat,
                yhat_lower: p.yhat_lower,
                yhat_upper: p.yhat_upper,
                suggested_inventory: suggested,
                current_stock,
                stockout_risk: suggested as f64 > current_stock,
                product: product.to_string(),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn points(yhats: &[f64]) -> Vec<ForecastPoint> {
        yhats
            .iter()
            .enumerate()
            .map(|(i, &y)| ForecastPoint {
                ds: NaiveDate::from_ymd_opt(2024, 1, 1 + i as u32).unwrap(),
                yhat: y,
                yhat_lower: y * 0.8,
                yhat_upper: y * 1.2,
            })
            .collect()
    }

    #[test]
    fn forty_with_twenty_percent_is_forty_eight() {
        assert_eq!(suggested_inventory(40.0, 20.0), 48);
    }

    #[test]
    fn ties_round_to_even() {
        assert_eq!(suggested_inventory(2.5, 0.0), 2);
        assert_eq!(suggested_inventory(3.5, 0.0), 4);
        assert_eq!(suggested_inventory(-2.5, 0.0), -2);
    }

    #[test]
    fn stock_is_broadcast_and_risk_is_per_day() {
        let out = annotate(&points(&[5.0, 10.0, 20.0]), 0.0, 10.0, "rice").unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|p| p.current_stock == 10.0 && p.product == "rice"));
        assert_eq!(
            out.iter().map(|p| p.stockout_risk).collect::<Vec<_>>(),
            vec![false, false, true]
        );
        assert_eq!(out[1].suggested_inventory, 10);
    }

    #[test]
    fn forecast_fields_pass_through() {
        let input = points(&[12.0]);
        let out = annotate(&input, 50.0, 0.0, "oil").unwrap();
        assert_eq!(out[0].ds, input[0].ds);
        assert_eq!(out[0].yhat_lower, input[0].yhat_lower);
        assert_eq!(out[0].suggested_inventory, 18);
        assert!(out[0].stockout_risk);
    }

    #[test]
    fn larger_margin_never_clears_risk() {
        let input = points(&[3.0, 7.4, 11.0, 19.9, 40.0]);
        let stock = 12.0;
        let mut previous: Option<Vec<AnnotatedForecastPoint>> = None;
        for margin in (0..=200).step_by(5) {
            let out = annotate(&input, margin as f64, stock, "soap").unwrap();
            if let Some(prev) = &previous {
                for (before, after) in prev.iter().zip(&out) {
                    assert!(after.suggested_inventory >= before.suggested_inventory);
                    assert!(!(before.stockout_risk && !after.stockout_risk));
                }
            }
            previous = Some(out);
        }
    }

    #[test]
    fn negative_forecast_moves_further_below_zero_with_margin() {
        assert_eq!(suggested_inventory(-10.0, 0.0), -10);
        assert_eq!(suggested_inventory(-10.0, 50.0), -15);

        let out = annotate(&points(&[-10.0]), 50.0, 0.0, "soap").unwrap();
        assert_eq!(out[0].suggested_inventory, -15);
        assert!(!out[0].stockout_risk);
    }

    #[test]
    fn negative_margin_is_rejected() {
        let err = annotate(&points(&[1.0]), -5.0, 0.0, "soap").unwrap_err();
        assert!(matches!(err, StockcastError::InvalidParameter { .. }));
    }
}
