//! HTTP 接口集成测试（feature = "web"）

#![cfg(feature = "web")]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use seller_copilot::config::AppConfig;
use seller_copilot::llm::{MockLlmClient, ScriptedLlmClient};
use seller_copilot::server::{router, ServerState};
use seller_copilot::tools::MockMarketplace;
use seller_copilot::{mock_services, Copilot};

fn app() -> Router {
    let mut cfg = AppConfig::default();
    cfg.retry.base_delay_ms = 1;
    cfg.retry.max_delay_ms = 1;
    let copilot = Copilot::with_components(
        Arc::new(MockLlmClient),
        Arc::new(MockMarketplace::new()),
        &cfg,
    );
    router(Arc::new(ServerState::new(Arc::new(copilot))))
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_analyze(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/analyze")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_analyze_returns_full_response() {
    let resp = app()
        .oneshot(post_analyze(json!({
            "listing_id": "listing_001",
            "question": "Why isn't my product selling?"
        })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let v = body_json(resp).await;
    assert_eq!(v["listing_id"], "listing_001");
    assert_eq!(v["tools_used"].as_array().unwrap().len(), 4);
    assert_eq!(
        v["metadata"]["stages_completed"],
        json!(["tool_selection", "data_collection", "analysis", "recommendations"])
    );
    assert_eq!(v["metadata"]["priority_level"], "high");
    assert_eq!(
        v["metadata"]["tool_results"]["get_search_ranking"]["data"]["visibility"],
        "poor"
    );
    assert_eq!(
        v["metadata"]["tool_results"]["get_fulfillment_data"]["success"],
        true
    );
    assert!(v["metadata"]["key_insights"][0].is_string());
    assert!(v["metadata"]["execution_time_seconds"].is_number());
}

#[tokio::test]
async fn test_blank_fields_rejected() {
    let resp = app()
        .oneshot(post_analyze(json!({"listing_id": " ", "question": "why?"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app()
        .oneshot(post_analyze(json!({"listing_id": "listing_001", "question": ""})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"question cannot be empty");
}

#[tokio::test]
async fn test_status_records_last_execution() {
    let app = app();
    let resp = app.clone().oneshot(get("/crew/status")).await.unwrap();
    let v = body_json(resp).await;
    assert!(v["last_execution"].is_null());
    assert_eq!(v["crew"]["workflow_type"], "sequential");

    app.clone()
        .oneshot(post_analyze(json!({"listing_id": "listing_003", "question": "why?"})))
        .await
        .unwrap();

    let v = body_json(app.oneshot(get("/crew/status")).await.unwrap()).await;
    assert_eq!(v["last_execution"]["listing_id"], "listing_003");
    assert_eq!(v["last_execution"]["priority_level"], "critical");
    assert_eq!(v["last_execution"]["successful_count"], 4);
    let completed_at = v["last_execution"]["completed_at"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(completed_at).is_ok());
}

#[tokio::test]
async fn test_workflow_and_tools() {
    let v = body_json(app().oneshot(get("/crew/workflow")).await.unwrap()).await;
    let stages = v["workflow"]["stages"].as_array().unwrap();
    assert_eq!(stages.len(), 4);
    assert_eq!(stages[1]["node"], "data_collector");

    let v = body_json(app().oneshot(get("/tools")).await.unwrap()).await;
    let tools = v["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 4);
    assert_eq!(tools[0]["name"], "get_seller_metrics");
    assert!(tools[0]["input_schema"]["properties"]["listing_id"].is_object());
}

#[tokio::test]
async fn test_health_reflects_llm_availability() {
    let resp = app().oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "healthy");
}

#[tokio::test]
async fn test_scripted_llm_failure_still_ok_status() {
    let mut cfg = AppConfig::default();
    cfg.retry.base_delay_ms = 1;
    cfg.retry.max_delay_ms = 1;
    let llm = Arc::new(ScriptedLlmClient::with_replies([r#"["get_pricing_data"]"#]));
    let copilot = Copilot::with_components(llm, Arc::new(MockMarketplace::new()), &cfg);
    let app = router(Arc::new(ServerState::new(Arc::new(copilot))));

    let resp = app
        .oneshot(post_analyze(json!({"listing_id": "listing_001", "question": "price?"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["metadata"]["priority_level"], "critical");
    assert_eq!(v["recommendations"], json!(["Contact support - workflow error"]));
}

#[tokio::test]
async fn test_mock_services_endpoints() {
    let app = mock_services::router(Arc::new(MockMarketplace::new()));

    let resp = app
        .clone()
        .oneshot(get("/pricing/pricing/listing_001"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["price_percentile"], 85.0);

    let resp = app
        .oneshot(get("/seller-metrics/metrics/unknown"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let detail = body_json(resp).await["detail"].as_str().unwrap().to_string();
    assert!(detail.starts_with("Listing 'unknown' not found"));
}
