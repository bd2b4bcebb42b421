//! Mock 市场数据：四个数据服务的内置样例
//!
//! listing_001：CTR 低、排名差、定价高、发货慢；listing_002：各项健康；listing_003：缺货。
//! 未知 listing：metrics 返回 404，其余服务返回中性默认值。

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::FetchError;
use crate::tools::{DataSource, ToolKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerMetrics {
    pub listing_id: String,
    pub impressions: u64,
    pub clicks: u64,
    pub ctr: f64,
    pub conversions: u64,
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRanking {
    pub listing_id: String,
    pub avg_rank: f64,
    pub page_number: u32,
    pub keyword_match_score: f64,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingData {
    pub listing_id: String,
    pub seller_price: f64,
    pub median_competitor_price: f64,
    pub price_percentile: f64,
    pub currency: String,
    pub price_difference_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FulfillmentData {
    pub listing_id: String,
    pub shipping_days: u32,
    pub return_policy: String,
    pub in_stock: bool,
    pub fulfillment_method: String,
}

/// 内存中的数据服务，实现 DataSource
#[derive(Debug, Clone)]
pub struct MockMarketplace {
    metrics: HashMap<String, SellerMetrics>,
    rankings: HashMap<String, SearchRanking>,
    pricing: HashMap<String, PricingData>,
    fulfillment: HashMap<String, FulfillmentData>,
}

impl Default for MockMarketplace {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMarketplace {
    pub fn new() -> Self {
        let metrics = [
            ("listing_001", 5000, 50, 0.01, 2, 0.04),
            ("listing_002", 15000, 600, 0.04, 120, 0.20),
            ("listing_003", 200, 10, 0.05, 0, 0.0),
        ]
        .into_iter()
        .map(|(id, impressions, clicks, ctr, conversions, conversion_rate)| {
            (
                id.to_string(),
                SellerMetrics {
                    listing_id: id.to_string(),
                    impressions,
                    clicks,
                    ctr,
                    conversions,
                    conversion_rate,
                },
            )
        })
        .collect();

        let rankings = [
            ("listing_001", 45.5, 5, 0.3, "Electronics"),
            ("listing_002", 3.2, 1, 0.92, "Home & Kitchen"),
            ("listing_003", 15.0, 2, 0.65, "Books"),
        ]
        .into_iter()
        .map(|(id, avg_rank, page_number, keyword_match_score, category)| {
            (
                id.to_string(),
                SearchRanking {
                    listing_id: id.to_string(),
                    avg_rank,
                    page_number,
                    keyword_match_score,
                    category: category.to_string(),
                },
            )
        })
        .collect();

        let pricing = [
            ("listing_001", 299.99, 249.99, 85.0, 20.0),
            ("listing_002", 49.99, 52.99, 35.0, -5.66),
            ("listing_003", 15.99, 12.99, 75.0, 23.1),
        ]
        .into_iter()
        .map(|(id, seller_price, median, percentile, diff)| {
            (
                id.to_string(),
                PricingData {
                    listing_id: id.to_string(),
                    seller_price,
                    median_competitor_price: median,
                    price_percentile: percentile,
                    currency: "USD".to_string(),
                    price_difference_percent: diff,
                },
            )
        })
        .collect();

        let fulfillment = [
            ("listing_001", 12, "30-day return, buyer pays shipping", true, "FBM"),
            ("listing_002", 2, "Free 30-day return", true, "FBA"),
            ("listing_003", 5, "15-day return, buyer pays shipping", false, "FBM"),
        ]
        .into_iter()
        .map(|(id, shipping_days, return_policy, in_stock, method)| {
            (
                id.to_string(),
                FulfillmentData {
                    listing_id: id.to_string(),
                    shipping_days,
                    return_policy: return_policy.to_string(),
                    in_stock,
                    fulfillment_method: method.to_string(),
                },
            )
        })
        .collect();

        Self {
            metrics,
            rankings,
            pricing,
            fulfillment,
        }
    }

    pub fn seller_metrics(&self, listing_id: &str) -> Result<SellerMetrics, FetchError> {
        self.metrics.get(listing_id).cloned().ok_or_else(|| {
            FetchError::NotFound(format!(
                "Listing '{listing_id}' not found. Available test listings: listing_001, listing_002, listing_003"
            ))
        })
    }

    pub fn search_ranking(&self, listing_id: &str) -> SearchRanking {
        self.rankings
            .get(listing_id)
            .cloned()
            .unwrap_or_else(|| SearchRanking {
                listing_id: listing_id.to_string(),
                avg_rank: 20.0,
                page_number: 2,
                keyword_match_score: 0.5,
                category: "General".to_string(),
            })
    }

    pub fn pricing_data(&self, listing_id: &str) -> PricingData {
        self.pricing
            .get(listing_id)
            .cloned()
            .unwrap_or_else(|| PricingData {
                listing_id: listing_id.to_string(),
                seller_price: 50.0,
                median_competitor_price: 50.0,
                price_percentile: 50.0,
                currency: "USD".to_string(),
                price_difference_percent: 0.0,
            })
    }

    pub fn fulfillment_data(&self, listing_id: &str) -> FulfillmentData {
        self.fulfillment
            .get(listing_id)
            .cloned()
            .unwrap_or_else(|| FulfillmentData {
                listing_id: listing_id.to_string(),
                shipping_days: 5,
                return_policy: "30-day return".to_string(),
                in_stock: true,
                fulfillment_method: "FBM".to_string(),
            })
    }

    /// 按工具种类返回原始 JSON 记录
    pub fn record(&self, tool: ToolKind, listing_id: &str) -> Result<Value, FetchError> {
        let value = match tool {
            ToolKind::SellerMetrics => serde_json::to_value(self.seller_metrics(listing_id)?),
            ToolKind::SearchRanking => serde_json::to_value(self.search_ranking(listing_id)),
            ToolKind::Pricing => serde_json::to_value(self.pricing_data(listing_id)),
            ToolKind::Fulfillment => serde_json::to_value(self.fulfillment_data(listing_id)),
        };
        value.map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl DataSource for MockMarketplace {
    async fn fetch(&self, tool: ToolKind, listing_id: &str) -> Result<Value, FetchError> {
        tracing::debug!(tool = %tool, listing_id, "mock marketplace fetch");
        self.record(tool, listing_id)
    }
}
