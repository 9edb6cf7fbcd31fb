//! Error bodies for the HTTP routes.
//!
//! The same [`ServiceError`] renders differently depending on the route
//! family: chain routes answer `{error}`, record and oracle routes answer
//! `{success: false, error}`, and oracle upstream failures are 502.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::{ServiceError, ServiceResult};

/// Unwrap a JSON request body. A missing content type or a body that does
/// not parse becomes a validation error in the route's own format.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ServiceResult<T> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        ServiceError::validation(format!("Cuerpo JSON inválido: {}", rejection.body_text()))
    })
}

/// `{error}` body for chain routes.
#[derive(Debug)]
pub struct ChainError(pub ServiceError);

/// `{success: false, error}` body for datastore routes.
#[derive(Debug)]
pub struct RecordError(pub ServiceError);

/// `{success: false, error}` body for oracle routes.
#[derive(Debug)]
pub struct OracleError(pub ServiceError);

impl From<ServiceError> for ChainError {
    fn from(err: ServiceError) -> Self {
        ChainError(err)
    }
}

impl From<ServiceError> for RecordError {
    fn from(err: ServiceError) -> Self {
        RecordError(err)
    }
}

impl From<ServiceError> for OracleError {
    fn from(err: ServiceError) -> Self {
        OracleError(err)
    }
}

fn log(status: StatusCode, err: &ServiceError) {
    if status.is_server_error() {
        tracing::error!("Request failed ({}): {}", status, err);
    } else {
        tracing::debug!("Request rejected ({}): {}", status, err);
    }
}

impl IntoResponse for ChainError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        log(status, &self.0);
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl IntoResponse for RecordError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        log(status, &self.0);
        (
            status,
            Json(json!({ "success": false, "error": self.0.to_string() })),
        )
            .into_response()
    }
}

impl IntoResponse for OracleError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ref other => other.status(),
        };
        log(status, &self.0);
        (
            status,
            Json(json!({ "success": false, "error": self.0.to_string() })),
        )
            .into_response()
    }
}
