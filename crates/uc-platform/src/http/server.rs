use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uc_app::sync::InboundError;
use uc_app::SyncEngine;
use uc_core::network::{TransferAnnouncement, TransferChunk};
use uc_core::{ClipboardSnapshot, ErrorClass, Fingerprint, PeerRequest, PeerResponse, TransferError};

use super::dto::{
    BeginResponseDto, ChunkResponseDto, ErrorDto, FinalizeRequestDto, FinalizeResponseDto,
    IdentityDto, OfferResponseDto,
};

const MIN_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// HTTP front of the local [`SyncEngine`].
pub struct PeerHttpServer {
    listener: TcpListener,
    engine: Arc<SyncEngine>,
}

impl PeerHttpServer {
    pub async fn bind(addr: &str, engine: Arc<SyncEngine>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("bind HTTP server on {addr}"))?;
        Ok(Self { listener, engine })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("read HTTP server address")
    }

    /// Serve until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr = self.local_addr()?;
        info!(%addr, "HTTP server listening");

        axum::serve(self.listener, router(self.engine))
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
                info!("HTTP server shutting down");
            })
            .await
            .context("HTTP server failed")
    }
}

pub fn router(engine: Arc<SyncEngine>) -> Router {
    // Base64 inflates a chunk by a third; leave room for the JSON around it.
    let body_limit = (engine.ledger().limits().max_chunk_size as usize)
        .saturating_mul(2)
        .max(MIN_BODY_LIMIT);

    Router::new()
        .route("/identity", get(get_identity).post(post_identity))
        .route("/clipboard", get(get_clipboard).post(post_clipboard))
        .route("/transfer/begin", post(begin_transfer))
        .route("/transfer/chunk", post(send_chunk))
        .route("/transfer/finalize", post(finalize_transfer))
        .route("/transfer/{fingerprint}/status", get(transfer_status))
        .route("/transfer/{fingerprint}", get(transfer_content))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

async fn get_identity(State(engine): State<Arc<SyncEngine>>) -> Json<IdentityDto> {
    Json(IdentityDto {
        peer_id: engine.local_peer().clone(),
    })
}

async fn post_identity(
    State(engine): State<Arc<SyncEngine>>,
    payload: Result<Json<IdentityDto>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(dto)) => dispatch(&engine, PeerRequest::Handshake { peer_id: dto.peer_id }).await,
        Err(rejection) => bad_request("identity", rejection),
    }
}

async fn get_clipboard(State(engine): State<Arc<SyncEngine>>) -> Response {
    dispatch(&engine, PeerRequest::FetchClipboard).await
}

async fn post_clipboard(
    State(engine): State<Arc<SyncEngine>>,
    payload: Result<Json<ClipboardSnapshot>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(snapshot)) => dispatch(&engine, PeerRequest::PushClipboard(snapshot)).await,
        Err(rejection) => bad_request("clipboard", rejection),
    }
}

async fn begin_transfer(
    State(engine): State<Arc<SyncEngine>>,
    payload: Result<Json<TransferAnnouncement>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(announcement)) => {
            dispatch(&engine, PeerRequest::BeginTransfer(announcement)).await
        }
        Err(rejection) => bad_request("transfer/begin", rejection),
    }
}

async fn send_chunk(
    State(engine): State<Arc<SyncEngine>>,
    payload: Result<Json<TransferChunk>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(chunk)) => dispatch(&engine, PeerRequest::SendChunk(chunk)).await,
        Err(rejection) => bad_request("transfer/chunk", rejection),
    }
}

async fn finalize_transfer(
    State(engine): State<Arc<SyncEngine>>,
    payload: Result<Json<FinalizeRequestDto>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(dto)) => {
            let request = PeerRequest::FinalizeTransfer {
                fingerprint: dto.fingerprint,
            };
            dispatch(&engine, request).await
        }
        Err(rejection) => bad_request("transfer/finalize", rejection),
    }
}

async fn transfer_status(
    State(engine): State<Arc<SyncEngine>>,
    Path(fingerprint): Path<String>,
) -> Response {
    match Fingerprint::parse(&fingerprint) {
        Some(fingerprint) => dispatch(&engine, PeerRequest::TransferStatus { fingerprint }).await,
        None => invalid_fingerprint(&fingerprint),
    }
}

async fn transfer_content(
    State(engine): State<Arc<SyncEngine>>,
    Path(fingerprint): Path<String>,
) -> Response {
    match Fingerprint::parse(&fingerprint) {
        Some(fingerprint) => dispatch(&engine, PeerRequest::FetchTransfer { fingerprint }).await,
        None => invalid_fingerprint(&fingerprint),
    }
}

async fn dispatch(engine: &SyncEngine, request: PeerRequest) -> Response {
    match engine.serve(request).await {
        Ok(response) => into_http(response),
        Err(err) => inbound_error(err),
    }
}

fn into_http(response: PeerResponse) -> Response {
    match response {
        PeerResponse::Identity { peer_id } => Json(IdentityDto { peer_id }).into_response(),
        PeerResponse::Clipboard(snapshot) => Json(snapshot).into_response(),
        PeerResponse::Offer(outcome) => Json(OfferResponseDto::from(outcome)).into_response(),
        PeerResponse::Begin(outcome) => Json(BeginResponseDto::from(outcome)).into_response(),
        PeerResponse::Chunk(outcome) => Json(ChunkResponseDto { outcome }).into_response(),
        PeerResponse::Finalize(outcome) => {
            Json(FinalizeResponseDto::from(outcome)).into_response()
        }
        PeerResponse::Status(record) => Json(record).into_response(),
        PeerResponse::Content(bytes) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            bytes,
        )
            .into_response(),
    }
}

fn inbound_error(err: InboundError) -> Response {
    let status = match &err {
        InboundError::NotComplete(_) | InboundError::Transfer(TransferError::UnknownTransfer(_)) => {
            StatusCode::NOT_FOUND
        }
        InboundError::Transfer(
            TransferError::NotActive { .. }
            | TransferError::DuplicateTransfer(_)
            | TransferError::AlreadyComplete(_),
        ) => StatusCode::CONFLICT,
        InboundError::Transfer(
            TransferError::ChunkOutOfRange { .. }
            | TransferError::ChunkSizeMismatch { .. }
            | TransferError::InvalidAnnouncement(_),
        ) => StatusCode::BAD_REQUEST,
    };
    let class = err.class();
    warn!(error = %err, class = class.as_str(), status = status.as_u16(), "Rejected peer request");
    error_response(status, err.to_string(), Some(class))
}

fn bad_request(endpoint: &str, rejection: JsonRejection) -> Response {
    warn!(endpoint, error = %rejection.body_text(), "Malformed peer request");
    error_response(
        StatusCode::BAD_REQUEST,
        rejection.body_text(),
        Some(ErrorClass::ProtocolViolation),
    )
}

fn invalid_fingerprint(raw: &str) -> Response {
    warn!(fingerprint = raw, "Malformed fingerprint in path");
    error_response(
        StatusCode::BAD_REQUEST,
        format!("invalid fingerprint: {raw}"),
        Some(ErrorClass::ProtocolViolation),
    )
}

fn error_response(status: StatusCode, error: String, class: Option<ErrorClass>) -> Response {
    (status, Json(ErrorDto { error, class })).into_response()
}
