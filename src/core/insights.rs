//! 关键洞察与优先级规则（纯函数）
//!
//! 洞察按固定工具顺序扫描：metrics → ranking → pricing → fulfillment；
//! 优先级依赖洞察的数量与 critical 标记，顺序有意义。

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::core::PriorityLevel;
use crate::tools::ToolKind;

/// 一条洞察；序列化为纯字符串
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insight {
    pub message: String,
    pub critical: bool,
}

impl Insight {
    fn new(message: String) -> Self {
        Self {
            message,
            critical: false,
        }
    }

    fn critical(message: String) -> Self {
        Self {
            message,
            critical: true,
        }
    }
}

impl fmt::Display for Insight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Serialize for Insight {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.message)
    }
}

fn label<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str)
}

fn ratio_percent(data: &Value, key: &str) -> f64 {
    data.get(key).and_then(Value::as_f64).unwrap_or(0.0) * 100.0
}

/// 原样展示数值字段（缺失时为 null）
fn raw(data: &Value, key: &str) -> String {
    data.get(key).cloned().unwrap_or(Value::Null).to_string()
}

/// 从已归一化的成功数据中提取洞察
pub fn extract_insights(data: &BTreeMap<ToolKind, &Value>) -> Vec<Insight> {
    let mut insights = Vec::new();

    if let Some(metrics) = data.get(&ToolKind::SellerMetrics) {
        if label(metrics, "ctr_interpretation") == Some("low") {
            insights.push(Insight::new(format!(
                "Low CTR: {:.1}%",
                ratio_percent(metrics, "ctr")
            )));
        }
        if label(metrics, "conversion_interpretation") == Some("low") {
            insights.push(Insight::new(format!(
                "Low conversion rate: {:.1}%",
                ratio_percent(metrics, "conversion_rate")
            )));
        }
    }

    if let Some(ranking) = data.get(&ToolKind::SearchRanking) {
        if matches!(label(ranking, "visibility"), Some("poor" | "very_poor")) {
            insights.push(Insight::new(format!(
                "Poor visibility: Rank {}",
                raw(ranking, "avg_rank")
            )));
        }
        if matches!(label(ranking, "seo_quality"), Some("needs_improvement" | "poor")) {
            insights.push(Insight::new(format!(
                "SEO needs work: Score {}",
                raw(ranking, "keyword_match_score")
            )));
        }
    }

    if let Some(pricing) = data.get(&ToolKind::Pricing) {
        if label(pricing, "price_competitiveness") == Some("expensive") {
            let diff = pricing
                .get("price_difference_percent")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            insights.push(Insight::new(format!("Overpriced: {diff:.1}% above median")));
        }
    }

    if let Some(fulfillment) = data.get(&ToolKind::Fulfillment) {
        if matches!(label(fulfillment, "shipping_speed"), Some("slow" | "very_slow")) {
            insights.push(Insight::new(format!(
                "Slow shipping: {} days",
                raw(fulfillment, "shipping_days")
            )));
        }
        if let Some(issue) = label(fulfillment, "critical_issue") {
            insights.push(Insight::critical(format!("🚨 CRITICAL: {issue}")));
        }
    }

    insights
}

/// critical（任一 critical 洞察或缺货）> high（≥3 条）> medium（≥1 条）> low
pub fn determine_priority(insights: &[Insight], data: &BTreeMap<ToolKind, &Value>) -> PriorityLevel {
    if insights.iter().any(|i| i.critical) {
        return PriorityLevel::Critical;
    }

    let out_of_stock = data
        .get(&ToolKind::Fulfillment)
        .and_then(|f| f.get("in_stock"))
        .and_then(Value::as_bool)
        == Some(false);
    if out_of_stock {
        return PriorityLevel::Critical;
    }

    match insights.len() {
        n if n >= 3 => PriorityLevel::High,
        n if n >= 1 => PriorityLevel::Medium,
        _ => PriorityLevel::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::normalize::normalize;
    use crate::tools::MockMarketplace;

    fn normalized(listing: &str) -> BTreeMap<ToolKind, Value> {
        let market = MockMarketplace::new();
        ToolKind::ALL
            .into_iter()
            .map(|kind| (kind, normalize(kind, market.record(kind, listing).unwrap())))
            .collect()
    }

    fn borrowed(data: &BTreeMap<ToolKind, Value>) -> BTreeMap<ToolKind, &Value> {
        data.iter().map(|(k, v)| (*k, v)).collect()
    }

    fn messages(insights: &[Insight]) -> Vec<&str> {
        insights.iter().map(|i| i.message.as_str()).collect()
    }

    #[test]
    fn test_struggling_listing_insights_in_tool_order() {
        let data = normalized("listing_001");
        let insights = extract_insights(&borrowed(&data));
        assert_eq!(
            messages(&insights),
            vec![
                "Low CTR: 1.0%",
                "Low conversion rate: 4.0%",
                "Poor visibility: Rank 45.5",
                "SEO needs work: Score 0.3",
                "Overpriced: 20.0% above median",
                "Slow shipping: 12 days",
            ]
        );
        assert_eq!(
            determine_priority(&insights, &borrowed(&data)),
            PriorityLevel::High
        );
    }

    #[test]
    fn test_healthy_listing_is_low_priority() {
        let data = normalized("listing_002");
        let insights = extract_insights(&borrowed(&data));
        assert!(insights.is_empty());
        assert_eq!(
            determine_priority(&insights, &borrowed(&data)),
            PriorityLevel::Low
        );
    }

    #[test]
    fn test_out_of_stock_is_critical() {
        let data = normalized("listing_003");
        let insights = extract_insights(&borrowed(&data));
        assert_eq!(
            insights.last().map(|i| i.message.as_str()),
            Some("🚨 CRITICAL: out_of_stock")
        );
        assert!(insights.last().unwrap().critical);
        assert_eq!(
            determine_priority(&insights, &borrowed(&data)),
            PriorityLevel::Critical
        );
    }

    #[test]
    fn test_out_of_stock_without_insight_still_critical() {
        let fulfillment = serde_json::json!({"in_stock": false});
        let data = BTreeMap::from([(ToolKind::Fulfillment, &fulfillment)]);
        assert_eq!(determine_priority(&[], &data), PriorityLevel::Critical);
    }

    #[test]
    fn test_priority_thresholds() {
        let data = BTreeMap::new();
        let one = vec![Insight::new("a".into())];
        let three = vec![
            Insight::new("a".into()),
            Insight::new("b".into()),
            Insight::new("c".into()),
        ];
        assert_eq!(determine_priority(&one, &data), PriorityLevel::Medium);
        assert_eq!(determine_priority(&three, &data), PriorityLevel::High);
    }

    #[test]
    fn test_insight_serializes_as_string() {
        let insight = Insight::critical("🚨 CRITICAL: out_of_stock".into());
        assert_eq!(
            serde_json::to_string(&insight).unwrap(),
            "\"🚨 CRITICAL: out_of_stock\""
        );
    }
}
