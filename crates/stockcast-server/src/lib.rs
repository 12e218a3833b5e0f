pub mod embed;
pub mod error;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, Request};
use axum::routing::{get, post};
use axum::Router;
use stockcast_core::config::Config;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Multipart framing on top of the file itself.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: state::AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request| {
        tracing::info_span!(
            "request",
            id = %uuid::Uuid::new_v4(),
            method = %req.method(),
            uri = %req.uri(),
        )
    });

    let body_limit = app_state
        .config
        .server
        .max_upload_bytes
        .saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route("/api/config", get(routes::config::get_config))
        .route("/api/forecast", post(routes::forecast::forecast_json))
        .route("/api/forecast/csv", post(routes::forecast::forecast_csv))
        .fallback(embed::static_handler)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(trace)
        .layer(cors)
        .with_state(app_state)
}

/// Start the forecast server.
pub async fn serve(config: Config, port: u16, open_browser: bool) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(config, listener, open_browser).await
}

/// Start the forecast server on a pre-bound listener.
///
/// The caller can read the actual port before starting (useful when
/// `port = 0` and the OS picks a free port).
pub async fn serve_on(
    config: Config,
    listener: tokio::net::TcpListener,
    open_browser: bool,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(state::AppState::new(config));

    tracing::info!("stockcast listening on http://localhost:{actual_port}");

    if open_browser {
        let url = format!("http://localhost:{actual_port}");
        if let Err(e) = open::that(&url) {
            tracing::warn!(error = %e, "could not open browser");
        }
    }

    axum::serve(listener, app).await?;
    Ok(())
}
