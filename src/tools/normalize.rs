//! 响应归一化：从原始数值字段派生定性标签
//!
//! 分档阈值全部是静态表，按表顺序取第一个命中的档位，都不命中则取兜底标签。

use serde_json::{Map, Value};

use crate::tools::ToolKind;

/// 比较方式
#[derive(Debug, Clone, Copy)]
enum Cmp {
    /// value < threshold
    Below,
    /// value <= threshold
    AtMost,
    /// value >= threshold
    AtLeast,
}

/// 分档表：(比较方式, [(阈值, 标签)], 兜底标签)
struct BucketTable {
    cmp: Cmp,
    steps: &'static [(f64, &'static str)],
    otherwise: &'static str,
}

impl BucketTable {
    fn label(&self, value: f64) -> &'static str {
        self.steps
            .iter()
            .find(|(threshold, _)| match self.cmp {
                Cmp::Below => value < *threshold,
                Cmp::AtMost => value <= *threshold,
                Cmp::AtLeast => value >= *threshold,
            })
            .map(|(_, label)| *label)
            .unwrap_or(self.otherwise)
    }
}

const CTR: BucketTable = BucketTable {
    cmp: Cmp::Below,
    steps: &[(0.02, "low"), (0.05, "moderate")],
    otherwise: "good",
};

const CONVERSION: BucketTable = BucketTable {
    cmp: Cmp::Below,
    steps: &[(0.05, "low"), (0.15, "moderate")],
    otherwise: "good",
};

const VISIBILITY: BucketTable = BucketTable {
    cmp: Cmp::AtMost,
    steps: &[(10.0, "excellent"), (20.0, "good"), (50.0, "poor")],
    otherwise: "very_poor",
};

const SEO_QUALITY: BucketTable = BucketTable {
    cmp: Cmp::AtLeast,
    steps: &[(0.8, "excellent"), (0.6, "good"), (0.4, "needs_improvement")],
    otherwise: "poor",
};

const PRICE_COMPETITIVENESS: BucketTable = BucketTable {
    cmp: Cmp::AtLeast,
    steps: &[
        (75.0, "expensive"),
        (60.0, "above_average"),
        (40.0, "competitive"),
        (25.0, "below_average"),
    ],
    otherwise: "very_competitive",
};

const SHIPPING_SPEED: BucketTable = BucketTable {
    cmp: Cmp::AtMost,
    steps: &[(2.0, "fast"), (5.0, "moderate"), (10.0, "slow")],
    otherwise: "very_slow",
};

pub fn ctr_label(ctr: f64) -> &'static str {
    CTR.label(ctr)
}

pub fn conversion_label(rate: f64) -> &'static str {
    CONVERSION.label(rate)
}

pub fn visibility_label(avg_rank: f64) -> &'static str {
    VISIBILITY.label(avg_rank)
}

pub fn seo_quality_label(keyword_score: f64) -> &'static str {
    SEO_QUALITY.label(keyword_score)
}

pub fn price_competitiveness_label(percentile: f64) -> &'static str {
    PRICE_COMPETITIVENESS.label(percentile)
}

pub fn shipping_speed_label(days: f64) -> &'static str {
    SHIPPING_SPEED.label(days)
}

fn number(map: &Map<String, Value>, key: &str, default: f64) -> f64 {
    map.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn set(map: &mut Map<String, Value>, key: &str, label: &str) {
    map.insert(key.to_string(), Value::String(label.to_string()));
}

/// 按工具种类补充标签字段；非对象的响应原样返回
pub fn normalize(kind: ToolKind, raw: Value) -> Value {
    let Value::Object(mut map) = raw else {
        return raw;
    };

    match kind {
        ToolKind::SellerMetrics => {
            let ctr = number(&map, "ctr", 0.0);
            let conversion = number(&map, "conversion_rate", 0.0);
            set(&mut map, "ctr_interpretation", ctr_label(ctr));
            set(&mut map, "conversion_interpretation", conversion_label(conversion));
        }
        ToolKind::SearchRanking => {
            let avg_rank = number(&map, "avg_rank", 999.0);
            let keyword = number(&map, "keyword_match_score", 0.0);
            set(&mut map, "visibility", visibility_label(avg_rank));
            set(&mut map, "seo_quality", seo_quality_label(keyword));
        }
        ToolKind::Pricing => {
            let percentile = number(&map, "price_percentile", 50.0);
            set(&mut map, "price_competitiveness", price_competitiveness_label(percentile));
        }
        ToolKind::Fulfillment => {
            let days = number(&map, "shipping_days", 999.0);
            set(&mut map, "shipping_speed", shipping_speed_label(days));
            let in_stock = map.get("in_stock").and_then(Value::as_bool).unwrap_or(true);
            if !in_stock {
                set(&mut map, "critical_issue", "out_of_stock");
            }
        }
    }

    Value::Object(map)
}
