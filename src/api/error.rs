use crate::service::{FileshareErrorCode, ServiceError, ServiceErrorCode};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Service(#[from] ServiceError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Transfer not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

fn service_status(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::Service(ServiceErrorCode::MeshNotEnabled) => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Service(ServiceErrorCode::InternalFailure) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ServiceError::Fileshare(
            FileshareErrorCode::TransferNotFound | FileshareErrorCode::FileNotFound,
        ) => StatusCode::NOT_FOUND,
        ServiceError::Fileshare(
            FileshareErrorCode::LibFailure
            | FileshareErrorCode::PurgeFailure
            | FileshareErrorCode::TransferNotCreated,
        ) => StatusCode::INTERNAL_SERVER_ERROR,
        ServiceError::Fileshare(
            FileshareErrorCode::AlreadyAccepted
            | FileshareErrorCode::TransferInvalidated
            | FileshareErrorCode::FileInvalidated
            | FileshareErrorCode::FileNotInProgress,
        ) => StatusCode::CONFLICT,
        ServiceError::Fileshare(_) => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Service(e) => (service_status(&e), json!({ "error": e })),
            ApiError::InvalidRequest(e) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": e, "code": "INVALID_REQUEST" }),
            ),
            ApiError::NotFound(e) => (
                StatusCode::NOT_FOUND,
                json!({ "error": e, "code": "NOT_FOUND" }),
            ),
            ApiError::InternalError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": e, "code": "INTERNAL_ERROR" }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
