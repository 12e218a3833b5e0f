use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use stockcast_core::StockcastError;

// ---------------------------------------------------------------------------
// Internal sentinel for explicit statuses
// ---------------------------------------------------------------------------

/// Carries an explicit HTTP status through the `anyhow::Error` chain for
/// request problems that are not core errors (bad multipart, missing parts).
#[derive(Debug)]
struct StatusError {
    status: StatusCode,
    message: String,
}

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StatusError {}

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn with_status(status: StatusCode, msg: impl Into<String>) -> Self {
        Self(
            StatusError {
                status,
                message: msg.into(),
            }
            .into(),
        )
    }

    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, msg)
    }
}

pub fn status_for(err: &StockcastError) -> StatusCode {
    match err {
        StockcastError::UnsupportedFormat { .. } | StockcastError::InvalidParameter { .. } => {
            StatusCode::BAD_REQUEST
        }
        StockcastError::MissingColumns(_) => StatusCode::UNPROCESSABLE_ENTITY,
        StockcastError::ForecastFailure { .. }
        | StockcastError::ConfigNotFound(_)
        | StockcastError::Io(_)
        | StockcastError::Yaml(_)
        | StockcastError::Csv(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if let Some(s) = self.0.downcast_ref::<StatusError>() {
            s.status
        } else if let Some(e) = self.0.downcast_ref::<StockcastError>() {
            status_for(e)
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, %status, "request rejected");
        }

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    fn status_of(err: StockcastError) -> StatusCode {
        AppError(err.into()).into_response().status()
    }

    #[test]
    fn unsupported_format_maps_to_400() {
        let err = StockcastError::UnsupportedFormat {
            text: "not utf-8".into(),
            workbook: "bad zip".into(),
        };
        assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_columns_maps_to_422() {
        let err = StockcastError::MissingColumns(vec!["Units_Sold".into()]);
        assert_eq!(status_of(err), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn invalid_parameter_maps_to_400() {
        let err = StockcastError::invalid("horizon_days", "3 is outside 7..=90");
        assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn forecast_failure_maps_to_500() {
        let err = StockcastError::ForecastFailure {
            product: "rice".into(),
            reason: "forecast date out of range".into(),
        };
        assert_eq!(status_of(err), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn explicit_status_wins() {
        let response = AppError::with_status(StatusCode::PAYLOAD_TOO_LARGE, "too big").into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            AppError::bad_request("no file").into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn unknown_errors_map_to_500() {
        let response = AppError(anyhow::anyhow!("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
