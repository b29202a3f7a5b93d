use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::refresh::RefreshError;
use crate::store::StoreError;
use crate::summary::RenderError;

/// Application-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Persistence-layer failure.
    #[error("Database error: {0}")]
    DatabaseError(StoreError),
    /// Resource not found error.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Bad request error (invalid input).
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// An external data source could not be read during a refresh.
    #[error("External data source unavailable: {details}")]
    SourceUnavailable {
        /// Human readable failure, e.g. "Could not fetch data from restcountries.com".
        details: String,
    },
    /// Internal server error.
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for AppError {
    /// Maps each error variant to an HTTP status code and JSON body.
    ///
    /// Store and internal failures are logged here and reach the client without detail.
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::DatabaseError(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::SourceUnavailable { details } => {
                tracing::error!("Refresh failed: {}", details);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({
                        "error": "External data source unavailable",
                        "details": details,
                    }),
                )
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(name) => AppError::NotFound(format!("Country '{}' not found", name)),
            other => AppError::DatabaseError(other),
        }
    }
}

impl From<RefreshError> for AppError {
    /// Store failures stay internal errors, including those hit while reading the
    /// summary aggregates. Everything else is reported against the source that caused it.
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Store(e) | RefreshError::Render(RenderError::Store(e)) => {
                AppError::DatabaseError(e)
            }
            other => {
                if let RefreshError::Render(ref e) = other {
                    tracing::error!("Summary image generation failed: {}", e);
                }
                AppError::SourceUnavailable {
                    details: format!("Could not fetch data from {}", other.failing_source()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{DataSource, SourceError};

    #[test]
    fn status_codes_follow_error_kind() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (
                AppError::SourceUnavailable {
                    details: "x".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (AppError::InternalError("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                AppError::DatabaseError(StoreError::Database(sqlx::Error::PoolClosed)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn refresh_source_failure_names_the_source() {
        let err: AppError = RefreshError::from(SourceError {
            data_source: DataSource::ExchangeRates,
            reason: "timed out".into(),
        })
        .into();

        match err {
            AppError::SourceUnavailable { details } => {
                assert_eq!(details, "Could not fetch data from open.er-api.com")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn store_failure_while_rendering_is_internal() {
        let err: AppError = RefreshError::from(RenderError::Store(StoreError::Database(
            sqlx::Error::PoolClosed,
        )))
        .into();
        assert!(matches!(err, AppError::DatabaseError(_)), "unexpected error: {:?}", err);
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn image_write_failure_is_blamed_on_unknown_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "cache dir missing");
        let err: AppError = RefreshError::from(RenderError::Io(io)).into();

        match err {
            AppError::SourceUnavailable { details } => {
                assert_eq!(details, "Could not fetch data from unknown")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn missing_country_becomes_not_found() {
        let err: AppError = StoreError::NotFound("Atlantis".into()).into();
        assert!(matches!(err, AppError::NotFound(ref msg) if msg.contains("Atlantis")));
    }
}
