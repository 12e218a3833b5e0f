use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use rust_embed::Embed;
use stockcast_core::config::{Config, IntRange};

use crate::state::AppState;

#[derive(Embed)]
#[folder = "$CARGO_MANIFEST_DIR/assets/"]
struct PageAssets;

const INDEX: &str = "index.html";

/// Serve embedded assets. Any path that is not an asset gets the upload page.
pub async fn static_handler(State(app): State<AppState>, uri: axum::http::Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    if !path.is_empty() && path != INDEX {
        if let Some(content) = <PageAssets as Embed>::get(path) {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            return (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.as_ref())],
                content.data.to_vec(),
            )
                .into_response();
        }
    }

    match <PageAssets as Embed>::get(INDEX) {
        Some(content) => {
            let template = String::from_utf8_lossy(&content.data);
            Html(render_index(&template, &app.config)).into_response()
        }
        None => (StatusCode::NOT_FOUND, "upload page missing").into_response(),
    }
}

/// Fill the page placeholders from the startup configuration.
pub fn render_index(template: &str, config: &Config) -> String {
    let horizon = &config.forecast.horizon_days;
    let margin = &config.forecast.margin_percent;
    let mut page = template
        .replace("{{title}}", &escape_html(&config.page.title))
        .replace("{{layout}}", config.page.layout.as_str());
    for (prefix, range) in [("horizon", horizon), ("margin", margin)] {
        page = fill_range(page, prefix, range);
    }
    page
}

fn fill_range(page: String, prefix: &str, range: &IntRange) -> String {
    page.replace(&format!("{{{{{prefix}_min}}}}"), &range.min.to_string())
        .replace(&format!("{{{{{prefix}_max}}}}"), &range.max.to_string())
        .replace(&format!("{{{{{prefix}_default}}}}"), &range.default.to_string())
        .replace(&format!("{{{{{prefix}_step}}}}"), &range.step.max(1).to_string())
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
