//! Mock 数据服务（feature = "web"）：用 MockMarketplace 模拟四个市场数据接口

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use crate::core::FetchError;
use crate::tools::{MockMarketplace, ToolKind};

type ServiceResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

pub fn router(market: Arc<MockMarketplace>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(|| async { Json(json!({"status": "healthy"})) }))
        .route("/seller-metrics/metrics/:listing_id", get(seller_metrics))
        .route("/search-ranking/ranking/:listing_id", get(search_ranking))
        .route("/pricing/pricing/:listing_id", get(pricing))
        .route("/fulfillment/fulfillment/:listing_id", get(fulfillment))
        .with_state(market)
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": "Marketplace Mock Services",
        "version": env!("CARGO_PKG_VERSION"),
        "services": ToolKind::ALL.iter().map(|k| k.display_name()).collect::<Vec<_>>(),
    }))
}

fn serve(market: &MockMarketplace, tool: ToolKind, listing_id: &str) -> ServiceResult {
    tracing::info!(tool = %tool, listing_id, "mock service request");
    market.record(tool, listing_id).map(Json).map_err(|e| match e {
        FetchError::NotFound(detail) => {
            tracing::warn!(listing_id, "listing not found");
            (StatusCode::NOT_FOUND, Json(json!({"detail": detail})))
        }
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": other.to_string()})),
        ),
    })
}

async fn seller_metrics(
    State(market): State<Arc<MockMarketplace>>,
    Path(listing_id): Path<String>,
) -> ServiceResult {
    serve(&market, ToolKind::SellerMetrics, &listing_id)
}

async fn search_ranking(
    State(market): State<Arc<MockMarketplace>>,
    Path(listing_id): Path<String>,
) -> ServiceResult {
    serve(&market, ToolKind::SearchRanking, &listing_id)
}

async fn pricing(
    State(market): State<Arc<MockMarketplace>>,
    Path(listing_id): Path<String>,
) -> ServiceResult {
    serve(&market, ToolKind::Pricing, &listing_id)
}

async fn fulfillment(
    State(market): State<Arc<MockMarketplace>>,
    Path(listing_id): Path<String>,
) -> ServiceResult {
    serve(&market, ToolKind::Fulfillment, &listing_id)
}
