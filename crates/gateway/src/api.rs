//! REST handlers and wire DTOs.
//!
//! Context-budget failures (question too long, conversation too long,
//! summarization trouble) are part of the chat contract: they come back
//! as a normal `200` with `success: false` and the user-facing message
//! in `response`, so the frontend renders them like any other assistant
//! turn. Infrastructure failures map to HTTP error codes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use ragline_context::{ContextUsage, UsageDiagnostics};
use ragline_core::error::{Error, RetrievalError};
use ragline_core::message::SessionId;
use ragline_retrieval::DocumentInfo;

use crate::SharedState;

/// Session used when the client does not supply one, mirroring a
/// single-user deployment.
const DEFAULT_SESSION: &str = "default";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn internal_error(err: impl std::fmt::Display) -> ApiError {
    error!(error = %err, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

// --- Health ---

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// --- Chat ---

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub response: String,
    pub success: bool,
    pub session_id: String,
    pub passages_used: usize,
    pub compacted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<ContextUsage>,
}

pub async fn query_handler(
    State(state): State<SharedState>,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let session = SessionId::from(payload.session_id.as_deref().unwrap_or(DEFAULT_SESSION));
    info!(session = %session, query_len = payload.query.len(), "query received");

    // Idle sessions are swept lazily on traffic rather than by a
    // background task.
    let evicted = state.engine.evict_idle_sessions().await;
    if evicted > 0 {
        info!(evicted, "idle sessions evicted");
    }

    match state.engine.handle_query(&session, &payload.query).await {
        Ok(outcome) => Ok(Json(QueryResponse {
            response: outcome.answer,
            success: true,
            session_id: session.to_string(),
            passages_used: outcome.passages_used,
            compacted: outcome.compacted,
            usage: Some(outcome.usage),
        })),
        // Budget violations are conversational outcomes, not HTTP errors.
        Err(Error::Context(e)) => Ok(Json(QueryResponse {
            response: e.user_message().to_string(),
            success: false,
            session_id: session.to_string(),
            passages_used: 0,
            compacted: false,
            usage: None,
        })),
        Err(e) => Err(internal_error(e)),
    }
}

// --- Session management ---

#[derive(Debug, Deserialize)]
pub struct ClearRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    pub success: bool,
}

pub async fn clear_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ClearRequest>,
) -> Json<MessageResponse> {
    let session = SessionId::from(payload.session_id.as_deref().unwrap_or(DEFAULT_SESSION));
    state.engine.clear_session(&session).await;

    Json(MessageResponse {
        message: "Chat memory cleared successfully".into(),
        success: true,
    })
}

#[derive(Debug, Deserialize)]
pub struct UsageParams {
    #[serde(default)]
    pub session_id: Option<String>,
}

pub async fn usage_handler(
    State(state): State<SharedState>,
    Query(params): Query<UsageParams>,
) -> Result<Json<UsageDiagnostics>, ApiError> {
    let session = SessionId::from(params.session_id.as_deref().unwrap_or(DEFAULT_SESSION));
    let usage = state
        .engine
        .usage(&session)
        .await
        .map_err(internal_error)?;
    Ok(Json(usage))
}

// --- Documents ---

#[derive(Debug, Serialize)]
pub struct DocumentsResponse {
    pub documents: Vec<DocumentInfo>,
}

pub async fn list_documents_handler(State(state): State<SharedState>) -> Json<DocumentsResponse> {
    Json(DocumentsResponse {
        documents: state.store.list_documents().await,
    })
}

#[derive(Debug, Deserialize)]
pub struct AddDocumentRequest {
    pub source: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct AddDocumentResponse {
    pub message: String,
    pub success: bool,
    pub chunks: usize,
}

pub async fn add_document_handler(
    State(state): State<SharedState>,
    Json(payload): Json<AddDocumentRequest>,
) -> Result<(StatusCode, Json<AddDocumentResponse>), ApiError> {
    if payload.source.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "document source must not be empty".into(),
            }),
        ));
    }

    match state.store.add_document(&payload.source, &payload.text).await {
        Ok(chunks) => Ok((
            StatusCode::CREATED,
            Json(AddDocumentResponse {
                message: format!("Document '{}' indexed", payload.source),
                success: true,
                chunks,
            }),
        )),
        Err(RetrievalError::DuplicateDocument(source)) => Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: format!("Document already exists: {source}"),
            }),
        )),
        Err(e) => Err(internal_error(e)),
    }
}

pub async fn clear_documents_handler(
    State(state): State<SharedState>,
) -> Json<MessageResponse> {
    let chunks = state.store.clear().await;
    info!(chunks, "document index cleared");
    Json(MessageResponse {
        message: format!("Successfully cleared all documents ({chunks} chunks removed)"),
        success: true,
    })
}

pub async fn delete_document_handler(
    State(state): State<SharedState>,
    Path(source): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    match state.store.delete_document(&source).await {
        Ok(chunks) => Ok(Json(MessageResponse {
            message: format!("Document '{source}' removed ({chunks} chunks)"),
            success: true,
        })),
        Err(RetrievalError::NotFound(source)) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Document not found: {source}"),
            }),
        )),
        Err(e) => Err(internal_error(e)),
    }
}
