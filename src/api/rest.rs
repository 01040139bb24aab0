use crate::api::error::{ApiError, ApiResult};
use crate::api::types::*;
use crate::event_manager::EventManagerError;
use crate::service::{
    AcceptRequest, ListResponse, SendRequest, StatusResponse, StatusStream, TransferService,
};
use crate::transfer::Transfer;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;

pub struct RestApi {
    service: Arc<TransferService>,
}

impl RestApi {
    pub fn new(service: Arc<TransferService>) -> Self {
        Self { service }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .route("/api/v1/transfers", post(send_files))
            .route("/api/v1/transfers", get(list_transfers))
            .route("/api/v1/transfers/:id", get(get_transfer))
            .route("/api/v1/transfers/:id/accept", post(accept_transfer))
            .route("/api/v1/transfers/:id/cancel", post(cancel_transfer))
            .route("/api/v1/transfers/:id/cancel_file", post(cancel_file))
            .route("/api/v1/notifications", put(set_notifications))
            .route("/api/v1/purge", post(purge_transfers))
            .route("/api/v1/stop", post(stop))
            .with_state(self.service.clone())
    }
}

/// First message of a stream, REST callers follow progress over the WebSocket instead
async fn first_response(mut stream: StatusStream) -> ApiResult<StatusResponse> {
    let response = stream
        .recv()
        .await
        .ok_or_else(|| ApiError::InternalError("empty status stream".to_string()))?;
    match response.error {
        Some(e) => Err(e.into()),
        None => Ok(response),
    }
}

async fn health_check(State(service): State<Arc<TransferService>>) -> &'static str {
    service.ping();
    "OK"
}

async fn send_files(
    State(service): State<Arc<TransferService>>,
    Json(mut req): Json<SendRequest>,
) -> ApiResult<(StatusCode, Json<StatusResponse>)> {
    if req.paths.is_empty() {
        return Err(ApiError::InvalidRequest("No paths given".to_string()));
    }
    // A subscription here would displace a WebSocket follower
    req.silent = true;

    let response = first_response(service.send(req)).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn list_transfers(
    State(service): State<Arc<TransferService>>,
) -> ApiResult<Json<Vec<ListResponse>>> {
    let chunks = service.list();
    if let Some(e) = chunks.first().and_then(|c| c.error) {
        return Err(e.into());
    }
    Ok(Json(chunks))
}

async fn get_transfer(
    State(service): State<Arc<TransferService>>,
    Path(transfer_id): Path<String>,
) -> ApiResult<Json<Transfer>> {
    service
        .event_manager()
        .get_transfer(&transfer_id)
        .map(Json)
        .map_err(|e| match e {
            EventManagerError::TransferNotFound(id) => ApiError::NotFound(id),
            e => ApiError::InternalError(e.to_string()),
        })
}

async fn accept_transfer(
    State(service): State<Arc<TransferService>>,
    Path(transfer_id): Path<String>,
    Json(body): Json<AcceptBody>,
) -> ApiResult<Json<StatusResponse>> {
    let stream = service.accept(AcceptRequest {
        transfer_id,
        dst_path: body.dst_path,
        files: body.files,
        silent: true,
    });
    Ok(Json(first_response(stream).await?))
}

async fn cancel_transfer(
    State(service): State<Arc<TransferService>>,
    Path(transfer_id): Path<String>,
) -> ApiResult<Json<SuccessResponse>> {
    service.cancel(&transfer_id)?;
    Ok(Json(SuccessResponse {
        message: format!("Transfer {transfer_id} canceled"),
    }))
}

async fn cancel_file(
    State(service): State<Arc<TransferService>>,
    Path(transfer_id): Path<String>,
    Json(body): Json<CancelFileBody>,
) -> ApiResult<Json<SuccessResponse>> {
    service.cancel_file(&transfer_id, &body.file)?;
    Ok(Json(SuccessResponse {
        message: format!("File {} of transfer {transfer_id} canceled", body.file),
    }))
}

async fn set_notifications(
    State(service): State<Arc<TransferService>>,
    Json(req): Json<SetNotificationsRequest>,
) -> Json<SetNotificationsResponse> {
    Json(SetNotificationsResponse {
        status: service.set_notifications(req.enable),
    })
}

async fn purge_transfers(
    State(service): State<Arc<TransferService>>,
    Json(req): Json<PurgeRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    service.purge_transfers_until(req.until)?;
    Ok(Json(SuccessResponse {
        message: format!("Transfers older than {} purged", req.until),
    }))
}

async fn stop(State(service): State<Arc<TransferService>>) -> Json<SuccessResponse> {
    service.stop();
    Json(SuccessResponse {
        message: "Stopping".to_string(),
    })
}
