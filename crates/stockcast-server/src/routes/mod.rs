pub mod config;
pub mod forecast;
