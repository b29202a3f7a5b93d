//! HTTP surface: route table, middleware and the generated OpenAPI document.

use std::sync::Arc;

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::handlers::{self, AppState};
use crate::models::{
    Country, ErrorResponse, RefreshResponse, SortOrder, SourceErrorResponse, StatusResponse,
};

/// No endpoint takes a body; keep the cap small.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(OpenApi)]
#[openapi(
    info(title = "Country Currency API"),
    paths(
        handlers::refresh_countries,
        handlers::list_countries,
        handlers::get_country_image,
        handlers::get_country,
        handlers::delete_country,
        handlers::get_status,
    ),
    components(schemas(
        Country,
        SortOrder,
        StatusResponse,
        RefreshResponse,
        SourceErrorResponse,
        ErrorResponse,
    )),
    tags(
        (name = "countries", description = "Country snapshot and refresh"),
        (name = "status", description = "Refresh status")
    )
)]
pub struct ApiDoc;

/// Serves the generated OpenAPI document.
async fn serve_openapi_spec() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

/// Where the generated document is served; the docs page loads it from here.
const OPENAPI_PATH: &str = "/api-docs/openapi.json";

/// Interactive docs for the country endpoints.
///
/// Swagger UI is loaded from the unpkg CDN and pointed at [`OPENAPI_PATH`].
/// Operations start collapsed by tag, and "Try it out" is on so
/// `POST /countries/refresh` can be fired straight from the page.
async fn serve_swagger_ui() -> impl IntoResponse {
    let html = format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Country Currency API {version}</title>
    <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
</head>
<body style="margin: 0">
    <div id="docs"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script>
        SwaggerUIBundle({{
            url: "{spec}",
            dom_id: "#docs",
            docExpansion: "list",
            tryItOutEnabled: true,
            displayRequestDuration: true,
            operationsSorter: "alpha"
        }});
    </script>
</body>
</html>
"##,
        version = env!("CARGO_PKG_VERSION"),
        spec = OPENAPI_PATH,
    );

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
}

/// Builds the full application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // API Documentation
        .route("/docs", get(serve_swagger_ui))
        .route(OPENAPI_PATH, get(serve_openapi_spec))
        // Countries
        .route("/countries", get(handlers::list_countries))
        .route("/countries/refresh", post(handlers::refresh_countries))
        .route("/countries/image", get(handlers::get_country_image))
        .route(
            "/countries/:name",
            get(handlers::get_country).delete(handlers::delete_country),
        )
        .route("/status", get(handlers::get_status))
        .with_state(state)
        // Body limit sits innermost so CORS and tracing see axum's body type
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_every_route() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let paths = doc["paths"].as_object().unwrap();

        for path in [
            "/countries",
            "/countries/refresh",
            "/countries/image",
            "/countries/{name}",
            "/status",
        ] {
            assert!(paths.contains_key(path), "missing {}", path);
        }
        assert!(doc["paths"]["/countries/{name}"]["delete"].is_object());
    }
}
