//! 入站 HTTP 接口（feature = "web"）
//!
//! POST /analyze、GET /health、GET /crew/status、GET /crew/workflow、GET /tools、GET /。
//! 客户端断开时 axum 丢弃 handler future，进行中的拉取任务随之被 abort。

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::agent::Copilot;
use crate::core::{AnalyzeRequest, AnalyzeResponse, CopilotError, PriorityLevel};

/// 最近一次执行的摘要
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSummary {
    pub listing_id: String,
    pub priority_level: PriorityLevel,
    pub successful_count: usize,
    pub total_tools: usize,
    pub execution_time_seconds: f64,
    pub completed_at: String,
}

impl ExecutionSummary {
    fn from_response(resp: &AnalyzeResponse) -> Self {
        Self {
            listing_id: resp.listing_id.clone(),
            priority_level: resp.metadata.priority_level,
            successful_count: resp.metadata.successful_count,
            total_tools: resp.metadata.total_tools,
            execution_time_seconds: resp.metadata.execution_time_seconds,
            completed_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

pub struct ServerState {
    pub copilot: Arc<Copilot>,
    last_execution: RwLock<Option<ExecutionSummary>>,
}

impl ServerState {
    pub fn new(copilot: Arc<Copilot>) -> Self {
        Self {
            copilot,
            last_execution: RwLock::new(None),
        }
    }
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/analyze", post(analyze))
        .route("/crew/status", get(crew_status))
        .route("/crew/workflow", get(crew_workflow))
        .route("/tools", get(tools))
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": "Seller Intelligence Copilot",
        "version": env!("CARGO_PKG_VERSION"),
        "architecture": "Four-stage pipeline",
        "description": "AI assistant that explains why products aren't selling",
        "endpoints": {
            "analyze": "POST /analyze - Analyze a listing",
            "health": "GET /health - Check API health",
            "crew_status": "GET /crew/status - Get pipeline status",
            "workflow": "GET /crew/workflow - View workflow",
            "tools": "GET /tools - List marketplace tools"
        }
    }))
}

async fn health(State(state): State<Arc<ServerState>>) -> (StatusCode, Json<Value>) {
    let llm_ok = state.copilot.llm_available().await;
    let details = json!({
        "pipeline": "healthy",
        "llm": if llm_ok { "healthy" } else { "unavailable" },
    });
    if llm_ok {
        (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "details": details,
                "message": "All systems operational"
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "degraded",
                "details": details,
                "message": "Some systems unavailable"
            })),
        )
    }
}

async fn analyze(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, (StatusCode, String)> {
    tracing::info!(listing_id = %req.listing_id, "analysis request");
    let resp = state.copilot.analyze(req).await.map_err(|e| match e {
        CopilotError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal server error: {other}"),
        ),
    })?;

    *state.last_execution.write().await = Some(ExecutionSummary::from_response(&resp));
    Ok(Json(resp))
}

async fn crew_status(State(state): State<Arc<ServerState>>) -> Json<Value> {
    let last = state.last_execution.read().await.clone();
    Json(json!({
        "crew": state.copilot.graph().status(),
        "last_execution": last,
        "description": "Four-stage pipeline for seller intelligence"
    }))
}

async fn crew_workflow(State(state): State<Arc<ServerState>>) -> Json<Value> {
    Json(json!({
        "workflow": {
            "description": "Sequential stage workflow",
            "stages": state.copilot.graph().describe(),
        }
    }))
}

async fn tools(State(state): State<Arc<ServerState>>) -> Json<Value> {
    Json(json!({
        "tools": state.copilot.graph().catalog().llm_descriptions(),
    }))
}
