use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ---------------------------------------------------------------------------
// SalesRecord / SalesTable
// ---------------------------------------------------------------------------

/// One validated upload row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Product")]
    pub product: String,
    #[serde(rename = "Units_Sold")]
    pub units_sold: f64,
    #[serde(rename = "Current_Stock")]
    pub current_stock: f64,
}

/// Validated rows of one upload, in upload order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SalesTable {
    pub records: Vec<SalesRecord>,
    /// Rows discarded because their Date did not parse.
    pub dropped_rows: usize,
    /// Whether the upload carried a Current_Stock column at all.
    pub has_current_stock: bool,
}

impl SalesTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct product identifiers in the order they first appear.
    pub fn products(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .map(|r| r.product.as_str())
            .filter(|p| seen.insert(*p))
            .collect()
    }

    /// Rows for one product, in upload order.
    pub fn rows_for<'a>(&'a self, product: &'a str) -> impl Iterator<Item = &'a SalesRecord> + 'a {
        self.records.iter().filter(move |r| r.product == product)
    }

    pub fn head(&self, n: usize) -> &[SalesRecord] {
        &self.records[..n.min(self.records.len())]
    }
}

// ---------------------------------------------------------------------------
// ForecastMethod
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    Seasonal,
    MovingAverage,
}

impl ForecastMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ForecastMethod::Seasonal => "seasonal",
            ForecastMethod::MovingAverage => "moving_average",
        }
    }
}

impl fmt::Display for ForecastMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ForecastPoint / AnnotatedForecastPoint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub ds: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

/// A forecast day with the safety buffer and stockout flag applied.
///
/// Field order and names match the exported CSV columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedForecastPoint {
    pub ds: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    #[serde(rename = "Suggested_Inventory")]
    pub suggested_inventory: i64,
    #[serde(rename = "Current_Stock")]
    pub current_stock: f64,
    #[serde(rename = "Stockout_Risk")]
    pub stockout_risk: bool,
    #[serde(rename = "Product")]
    pub product: String,
}
