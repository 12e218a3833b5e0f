use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use stockcast_core::config::Config;
use stockcast_core::orchestrator::{
    ForecastReport, ForecastRequest, Orchestrator, ProductFailure, ProductSummary,
};
use stockcast_core::types::{AnnotatedForecastPoint, SalesRecord, SalesTable};
use stockcast_core::{export, loader};

use crate::error::AppError;
use crate::state::AppState;

const PREVIEW_ROWS: usize = 5;

/// Names the products left out of a partial CSV download.
pub const FAILED_PRODUCTS_HEADER: HeaderName =
    HeaderName::from_static("x-stockcast-failed-products");

// ---------------------------------------------------------------------------
// Form
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ForecastForm {
    file: Bytes,
    file_name: Option<String>,
    horizon_days: u32,
    margin_percent: u32,
}

/// Read the `file`, `horizon_days` and `margin` parts. Missing numbers take
/// the configured defaults; present ones must lie inside the configured limits.
async fn read_form(config: &Config, mut multipart: Multipart) -> Result<ForecastForm, AppError> {
    let mut file = None;
    let mut file_name = None;
    let mut horizon_days = None;
    let mut margin_percent = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                file_name = field.file_name().map(str::to_string);
                file = Some(field.bytes().await.map_err(multipart_error)?);
            }
            Some("horizon_days") => {
                let text = field.text().await.map_err(multipart_error)?;
                horizon_days = Some(parse_whole("horizon_days", &text)?);
            }
            Some("margin") => {
                let text = field.text().await.map_err(multipart_error)?;
                margin_percent = Some(parse_whole("margin", &text)?);
            }
            other => {
                tracing::debug!(field = ?other, "ignoring form field");
            }
        }
    }

    let file = file.ok_or_else(|| AppError::bad_request("missing 'file' part"))?;
    if file.len() > config.server.max_upload_bytes {
        return Err(AppError::with_status(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!(
                "upload is {} bytes, limit is {}",
                file.len(),
                config.server.max_upload_bytes
            ),
        ));
    }
    let forecast = &config.forecast;
    Ok(ForecastForm {
        file,
        file_name,
        horizon_days: forecast
            .horizon_days
            .check("horizon_days", horizon_days.unwrap_or(forecast.horizon_days.default))?,
        margin_percent: forecast
            .margin_percent
            .check("margin", margin_percent.unwrap_or(forecast.margin_percent.default))?,
    })
}

fn parse_whole(name: &str, text: &str) -> Result<u32, AppError> {
    text.trim()
        .parse()
        .map_err(|_| AppError::bad_request(format!("{name} must be a whole number, got '{text}'")))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::with_status(e.status(), e.body_text())
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Load, forecast and annotate one upload on a blocking thread.
async fn run_pipeline(
    app: AppState,
    form: ForecastForm,
) -> Result<(SalesTable, ForecastReport), AppError> {
    tracing::info!(
        file = form.file_name.as_deref().unwrap_or("-"),
        bytes = form.file.len(),
        horizon_days = form.horizon_days,
        margin = form.margin_percent,
        "forecast request"
    );

    let result = tokio::task::spawn_blocking(move || {
        let table = loader::load(&form.file)?;
        let request = ForecastRequest {
            horizon_days: form.horizon_days as usize,
            margin_percent: f64::from(form.margin_percent),
            today: chrono::Local::now().date_naive(),
        };
        let report = Orchestrator::from_config(&app.forecaster, &app.config).run(&table, &request)?;
        Ok::<_, stockcast_core::StockcastError>((table, report))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(result)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ForecastResponse {
    pub rows_loaded: usize,
    pub rows_dropped: usize,
    pub has_current_stock: bool,
    pub horizon_days: u32,
    pub margin_percent: u32,
    pub preview: Vec<SalesRecord>,
    pub products: Vec<ProductSummary>,
    pub results: Vec<AnnotatedForecastPoint>,
    pub failures: Vec<ProductFailure>,
}

/// POST /api/forecast: multipart upload, JSON forecast.
pub async fn forecast_json(
    State(app): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ForecastResponse>, AppError> {
    let form = read_form(&app.config, multipart).await?;
    let (horizon_days, margin_percent) = (form.horizon_days, form.margin_percent);
    let (table, report) = run_pipeline(app, form).await?;

    Ok(Json(ForecastResponse {
        rows_loaded: table.len(),
        rows_dropped: table.dropped_rows,
        has_current_stock: table.has_current_stock,
        horizon_days,
        margin_percent,
        preview: table.head(PREVIEW_ROWS).to_vec(),
        products: report.products,
        results: report.rows,
        failures: report.failures,
    }))
}

/// Comma-separated failed product names, or `None` when nothing failed.
/// Characters outside printable ASCII are escaped.
fn failed_products_header(failures: &[ProductFailure]) -> Option<HeaderValue> {
    if failures.is_empty() {
        return None;
    }
    let names: Vec<String> = failures
        .iter()
        .map(|f| f.product.escape_default().to_string())
        .collect();
    HeaderValue::from_str(&names.join(", ")).ok()
}

/// POST /api/forecast/csv: multipart upload, `forecast.csv` attachment.
///
/// The CSV has no room for per-product errors, so failures from a partial
/// run are logged and named in [`FAILED_PRODUCTS_HEADER`].
pub async fn forecast_csv(
    State(app): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = read_form(&app.config, multipart).await?;
    let (_, report) = run_pipeline(app, form).await?;
    let body = export::to_csv_bytes(&report.rows)?;

    for failure in &report.failures {
        tracing::warn!(
            product = %failure.product,
            error = %failure.error,
            "product left out of CSV download"
        );
    }

    let mut response = (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"forecast.csv\"",
            ),
        ],
        body,
    )
        .into_response();
    if let Some(value) = failed_products_header(&report.failures) {
        response.headers_mut().insert(FAILED_PRODUCTS_HEADER, value);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_numbers_parse_with_whitespace() {
        assert_eq!(parse_whole("margin", " 25 \n").unwrap(), 25);
    }

    fn failure(product: &str) -> ProductFailure {
        ProductFailure {
            product: product.to_string(),
            error: "forecast date out of range".to_string(),
        }
    }

    #[test]
    fn no_failures_means_no_header() {
        assert!(failed_products_header(&[]).is_none());
    }

    #[test]
    fn failed_products_are_listed_in_order() {
        let value = failed_products_header(&[failure("rice"), failure("palm oil")]).unwrap();
        assert_eq!(value.to_str().unwrap(), "rice, palm oil");
    }

    #[test]
    fn non_ascii_product_names_are_escaped() {
        let value = failed_products_header(&[failure("café\n")]).unwrap();
        assert_eq!(value.to_str().unwrap(), "caf\\u{e9}\\n");
    }

    #[test]
    fn fractional_numbers_are_rejected() {
        let err = parse_whole("margin", "12.5").unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
