//! HTTP API gateway for lingxi.
//!
//! Routes:
//!
//! - `POST /api/workflow/execute` — run one request through the pipeline
//! - `GET  /api/tools/status`     — list registered capabilities
//! - `GET  /health`               — health check
//! - `GET  /`                     — service banner
//!
//! Built on Axum. Every endpoint answers with the uniform
//! `{code, message, data}` wrapper the frontend expects; the orchestrator's
//! non-throwing contract means the workflow endpoint cannot surface a raw
//! error.

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::response::Json;
use axum::routing::{get, post};
use axum::{Router, extract::State};
use lingxi_agent::{Orchestrator, WorkflowResponse};
use lingxi_core::tool::CapabilityRegistry;
use lingxi_oracle::OpenAiCompatOracle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared application state.
pub struct GatewayState {
    pub orchestrator: Orchestrator,
    pub registry: Arc<CapabilityRegistry>,
}

pub type SharedState = Arc<GatewayState>;

/// The uniform response wrapper.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            code: 200,
            message: "success".into(),
            data,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRequest {
    pub user_input: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    // CORS: the dev-server origins the frontend runs on.
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::list([
            "http://localhost:5173".parse::<HeaderValue>().unwrap(),
            "http://localhost:3000".parse::<HeaderValue>().unwrap(),
        ]))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/workflow/execute", post(execute_workflow_handler))
        .route("/api/tools/status", get(tools_status_handler))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Build state from configuration and start the HTTP server.
pub async fn start(config: lingxi_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let oracle = Arc::new(OpenAiCompatOracle::from_config(&config.oracle));
    let registry = Arc::new(lingxi_tools::default_registry(&config, oracle.clone()));
    let orchestrator = Orchestrator::new(oracle, registry.clone())
        .with_max_chain_steps(config.tools.max_chain_steps);

    let state = Arc::new(GatewayState {
        orchestrator,
        registry,
    });

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, oracle = config.has_oracle(), "Gateway listening");
    axum::serve(listener, router).await?;
    Ok(())
}

async fn root_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "lingxi API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn execute_workflow_handler(
    State(state): State<SharedState>,
    Json(request): Json<WorkflowRequest>,
) -> Json<ApiResponse<WorkflowResponse>> {
    let response = state
        .orchestrator
        .execute(&request.user_input, request.conversation_id.as_deref())
        .await;
    Json(ApiResponse::ok(response))
}

#[derive(Debug, Serialize, Deserialize)]
struct ToolStatus {
    name: String,
    status: String,
    description: String,
    required_params: Vec<String>,
    optional_params: Vec<String>,
}

async fn tools_status_handler(
    State(state): State<SharedState>,
) -> Json<ApiResponse<serde_json::Value>> {
    let tools: Vec<ToolStatus> = state
        .registry
        .descriptors()
        .into_iter()
        .map(|d| ToolStatus {
            name: d.name,
            status: "available".into(),
            description: d.description,
            required_params: d.required_params,
            optional_params: d.optional_params,
        })
        .collect();

    Json(ApiResponse::ok(serde_json::json!({ "tools": tools })))
}
