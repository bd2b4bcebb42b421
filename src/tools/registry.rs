//! 工具目录（ToolCatalog）
//!
//! 工具种类是封闭枚举 ToolKind；目录在启动时为每种工具构建 Fetcher，之后只读。
//! 字符串形式的工具名（LLM 返回的、请求里带的）只在目录边界解析，未知名称返回 UnknownTool。

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{CopilotError, RetryPolicy};
use crate::tools::{DataSource, Fetcher};

/// 工具种类，声明顺序即目录顺序（metrics → ranking → pricing → fulfillment）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ToolKind {
    #[serde(rename = "get_seller_metrics")]
    SellerMetrics,
    #[serde(rename = "get_search_ranking")]
    SearchRanking,
    #[serde(rename = "get_pricing_data")]
    Pricing,
    #[serde(rename = "get_fulfillment_data")]
    Fulfillment,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::SellerMetrics,
        ToolKind::SearchRanking,
        ToolKind::Pricing,
        ToolKind::Fulfillment,
    ];

    /// 工具名（用于 LLM 选择与结果映射的键）
    pub fn name(self) -> &'static str {
        match self {
            ToolKind::SellerMetrics => "get_seller_metrics",
            ToolKind::SearchRanking => "get_search_ranking",
            ToolKind::Pricing => "get_pricing_data",
            ToolKind::Fulfillment => "get_fulfillment_data",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ToolKind::SellerMetrics => "Seller Metrics",
            ToolKind::SearchRanking => "Search Ranking",
            ToolKind::Pricing => "Pricing",
            ToolKind::Fulfillment => "Fulfillment",
        }
    }

    /// 工具描述（供 LLM 理解功能）
    pub fn description(self) -> &'static str {
        match self {
            ToolKind::SellerMetrics => {
                "Retrieves performance metrics for a listing including impressions, \
                 clicks, click-through rate (CTR), conversions, and conversion rate. \
                 Use this to understand if the listing is getting visibility and engagement."
            }
            ToolKind::SearchRanking => {
                "Retrieves search ranking information including average rank position, \
                 page number, and keyword match score. Use this to understand discoverability \
                 and SEO optimization."
            }
            ToolKind::Pricing => {
                "Retrieves pricing information including seller's price, median competitor price, \
                 price percentile, and price difference percentage. Use this to understand \
                 competitive positioning and pricing strategy."
            }
            ToolKind::Fulfillment => {
                "Retrieves fulfillment information including shipping days, return policy, \
                 stock status, and fulfillment method. Use this to understand delivery \
                 competitiveness and availability issues."
            }
        }
    }

    /// 数据服务上的路径（相对 base_url）
    pub fn endpoint(self, listing_id: &str) -> String {
        match self {
            ToolKind::SellerMetrics => format!("/seller-metrics/metrics/{listing_id}"),
            ToolKind::SearchRanking => format!("/search-ranking/ranking/{listing_id}"),
            ToolKind::Pricing => format!("/pricing/pricing/{listing_id}"),
            ToolKind::Fulfillment => format!("/fulfillment/fulfillment/{listing_id}"),
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl AsRef<str> for ToolKind {
    fn as_ref(&self) -> &str {
        self.name()
    }
}

impl FromStr for ToolKind {
    type Err = CopilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| CopilotError::UnknownTool(s.to_string()))
    }
}

/// 所有工具共用的输入参数（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ListingQuery {
    /// The listing ID to query
    listing_id: String,
}

/// 工具描述符：名称、描述与拉取能力
#[derive(Clone)]
pub struct ToolDescriptor {
    pub kind: ToolKind,
    pub display_name: &'static str,
    pub description: &'static str,
    pub fetcher: Arc<Fetcher>,
}

impl ToolDescriptor {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// 供 LLM / API 展示的描述（含输入参数 JSON Schema）
    pub fn to_llm_description(&self) -> Value {
        let schema = serde_json::to_value(schema_for!(ListingQuery)).unwrap_or(Value::Null);
        serde_json::json!({
            "name": self.name(),
            "display_name": self.display_name,
            "description": self.description,
            "input_schema": schema,
        })
    }
}

/// 静态工具目录：启动时构建，之后只读
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    /// 为每种工具创建一个 Fetcher，共享同一数据源与重试策略
    pub fn new(source: Arc<dyn DataSource>, policy: RetryPolicy) -> Self {
        let tools = ToolKind::ALL
            .into_iter()
            .map(|kind| ToolDescriptor {
                kind,
                display_name: kind.display_name(),
                description: kind.description(),
                fetcher: Arc::new(Fetcher::new(kind, Arc::clone(&source), policy)),
            })
            .collect();
        Self { tools }
    }

    /// 全部工具，顺序稳定
    pub fn all(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn lookup(&self, name: &str) -> Result<&ToolDescriptor, CopilotError> {
        let kind: ToolKind = name.parse()?;
        Ok(self.get(kind))
    }

    pub fn get(&self, kind: ToolKind) -> &ToolDescriptor {
        // 目录按 ToolKind::ALL 顺序构建，每种工具恰好一项
        &self.tools[kind as usize]
    }

    pub fn kinds(&self) -> Vec<ToolKind> {
        self.tools.iter().map(|t| t.kind).collect()
    }

    /// 返回 (name, description) 列表，用于生成 prompt 中的 Available tools 段落
    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        self.tools
            .iter()
            .map(|t| (t.name().to_string(), t.description.to_string()))
            .collect()
    }

    pub fn llm_descriptions(&self) -> Vec<Value> {
        self.tools.iter().map(|t| t.to_llm_description()).collect()
    }
}
