use crate::output::{num, print_json, print_table};
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use stockcast_core::config::Config;
use stockcast_core::export;
use stockcast_core::forecast::Forecaster;
use stockcast_core::loader;
use stockcast_core::orchestrator::{ForecastRequest, Orchestrator};

#[derive(Args, Debug)]
pub struct ForecastArgs {
    /// Sales file (CSV or Excel workbook)
    pub file: PathBuf,

    /// Days to forecast (default: forecast.horizon_days.default)
    #[arg(long)]
    pub horizon: Option<u32>,

    /// Safety margin in percent (default: forecast.margin_percent.default)
    #[arg(long)]
    pub margin: Option<u32>,

    /// Write the full forecast as CSV to this path
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Forecast rows to print (0 prints none)
    #[arg(long, default_value = "20")]
    pub limit: usize,
}

pub fn run(config: &Config, args: ForecastArgs, json: bool) -> Result<()> {
    let limits = &config.forecast;
    let horizon = limits
        .horizon_days
        .check("horizon", args.horizon.unwrap_or(limits.horizon_days.default))?;
    let margin = limits
        .margin_percent
        .check("margin", args.margin.unwrap_or(limits.margin_percent.default))?;

    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let table = loader::load(&bytes)
        .with_context(|| format!("failed to load {}", args.file.display()))?;

    let forecaster = Forecaster::from_config(config);
    let request = ForecastRequest {
        horizon_days: horizon as usize,
        margin_percent: f64::from(margin),
        today: chrono::Local::now().date_naive(),
    };
    let report = Orchestrator::from_config(&forecaster, config).run(&table, &request)?;

    if let Some(path) = &args.output {
        export::write_csv_file(path, &report.rows)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    if json {
        let value = serde_json::json!({
            "rows_loaded": table.len(),
            "rows_dropped": table.dropped_rows,
            "has_current_stock": table.has_current_stock,
            "horizon_days": horizon,
            "margin_percent": margin,
            "products": report.products,
            "results": report.rows,
            "failures": report.failures,
        });
        return print_json(&value);
    }

    print!("Loaded {} rows", table.len());
    if table.dropped_rows > 0 {
        print!(" ({} dropped: unreadable Date)", table.dropped_rows);
    }
    println!();
    if !table.has_current_stock {
        println!("No Current_Stock column; stock treated as 0.");
    }
    println!();

    let products = report
        .products
        .iter()
        .map(|p| {
            vec![
                p.product.clone(),
                p.method.to_string(),
                num(p.current_stock),
                format!("{}/{}", p.at_risk_days, p.rows),
            ]
        })
        .collect();
    print_table(&["PRODUCT", "METHOD", "STOCK", "AT RISK"], products);

    for failure in &report.failures {
        println!("failed: {}: {}", failure.product, failure.error);
    }

    if args.limit > 0 && !report.rows.is_empty() {
        println!();
        let rows = report
            .rows
            .iter()
            .take(args.limit)
            .map(|r| {
                vec![
                    r.ds.to_string(),
                    r.product.clone(),
                    num(r.yhat),
                    num(r.yhat_lower),
                    num(r.yhat_upper),
                    r.suggested_inventory.to_string(),
                    if r.stockout_risk { "yes" } else { "" }.to_string(),
                ]
            })
            .collect();
        print_table(
            &["DATE", "PRODUCT", "YHAT", "LOWER", "UPPER", "SUGGESTED", "RISK"],
            rows,
        );
        if report.rows.len() > args.limit {
            println!("... {} more rows", report.rows.len() - args.limit);
        }
    }

    if let Some(path) = &args.output {
        println!();
        println!("Wrote {} rows to {}", report.rows.len(), path.display());
    }

    Ok(())
}
