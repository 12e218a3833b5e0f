pub mod config;
pub mod error;
pub mod export;
pub mod forecast;
pub mod loader;
pub mod orchestrator;
pub mod risk;
pub mod series;
pub mod types;

pub use error::{Result, StockcastError};
