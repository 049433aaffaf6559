//! HTTP API gateway for Ragline.
//!
//! Exposes REST endpoints for chat queries, session management, usage
//! diagnostics, and document administration.
//!
//! Built on Axum for high performance async HTTP.

pub mod api;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use ragline_config::AppConfig;
use ragline_context::{ChatEngine, HeuristicTokenizer, TokenAccountant};
use ragline_providers::{LlmSummarizer, OpenAiCompatEmbedder, OpenAiCompatProvider};
use ragline_retrieval::{Chunker, InMemoryVectorStore};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub engine: Arc<ChatEngine>,
    pub store: Arc<InMemoryVectorStore>,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
///
/// Layers applied: permissive CORS (the assistant frontend runs on a
/// separate origin), a 1 MB request body limit, and HTTP trace logging.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(api::health_handler))
        .route("/api/query", post(api::query_handler))
        .route("/api/clear", post(api::clear_handler))
        .route("/api/usage", get(api::usage_handler))
        .route(
            "/api/documents",
            get(api::list_documents_handler)
                .post(api::add_document_handler)
                .delete(api::clear_documents_handler),
        )
        .route(
            "/api/documents/{source}",
            delete(api::delete_document_handler),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
///
/// Builds the provider, embedder, store, and engine once and shares
/// them across requests.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let provider = Arc::new(OpenAiCompatProvider::from_config(&config)?);
    let summarizer = Arc::new(LlmSummarizer::new(provider.clone(), &config));
    let embedder = Arc::new(OpenAiCompatEmbedder::from_config(&config)?);
    let store = Arc::new(InMemoryVectorStore::new(
        embedder,
        Chunker::from_config(&config.retrieval),
    ));
    let accountant = TokenAccountant::new(Arc::new(HeuristicTokenizer));

    let engine = Arc::new(ChatEngine::new(
        &config,
        accountant,
        store.clone(),
        provider,
        summarizer,
    ));

    let state = Arc::new(GatewayState { engine, store });
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
