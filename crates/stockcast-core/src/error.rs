use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StockcastError {
    #[error("unsupported file format: not delimited text ({text}) and not a workbook ({workbook})")]
    UnsupportedFormat { text: String, workbook: String },

    #[error(
        "missing columns: {}. Required: Date, Product, Units_Sold. Optional: Current_Stock",
        .0.join(", ")
    )]
    MissingColumns(Vec<String>),

    #[error("forecast failed for product '{product}': {reason}")]
    ForecastFailure { product: String, reason: String },

    #[error("invalid {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl StockcastError {
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StockcastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_columns_message_lists_names() {
        let err = StockcastError::MissingColumns(vec!["Product".into(), "Units_Sold".into()]);
        let msg = err.to_string();
        assert!(msg.contains("Product, Units_Sold"));
        assert!(msg.contains("Optional: Current_Stock"));
    }

    #[test]
    fn forecast_failure_names_product() {
        let err = StockcastError::ForecastFailure {
            product: "rice-25kg".into(),
            reason: "date out of range".into(),
        };
        assert_eq!(
            err.to_string(),
            "forecast failed for product 'rice-25kg': date out of range"
        );
    }
}
