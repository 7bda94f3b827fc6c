//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reservation::{CatalogError, ReservationError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Reservation or cancellation error.
    Reservation(ReservationError),
    /// Event or slot management error.
    Catalog(CatalogError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Reservation(err) => reservation_error_to_response(err),
            ApiError::Catalog(err) => catalog_error_to_response(err),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn reservation_error_to_response(err: ReservationError) -> (StatusCode, String) {
    match &err {
        ReservationError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        ReservationError::Conflict(_) => (StatusCode::CONFLICT, err.to_string()),
        ReservationError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn catalog_error_to_response(err: CatalogError) -> (StatusCode, String) {
    match &err {
        CatalogError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        CatalogError::Invalid(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        CatalogError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

impl From<ReservationError> for ApiError {
    fn from(err: ReservationError) -> Self {
        ApiError::Reservation(err)
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        ApiError::Catalog(err)
    }
}

#[cfg(test)]
mod tests {
    use reservation::{Conflict, Missing};
    use slot_store::StoreError;

    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn maps_reservation_errors() {
        assert_eq!(
            status_of(ReservationError::NotFound(Missing::Slot).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ReservationError::from(Conflict::Duplicate).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ReservationError::from(StoreError::RetriesExhausted { attempts: 5 }).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn maps_catalog_errors() {
        assert_eq!(
            status_of(CatalogError::Invalid("title must not be empty".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CatalogError::NotFound(Missing::Event).into()),
            StatusCode::NOT_FOUND
        );
    }
}
