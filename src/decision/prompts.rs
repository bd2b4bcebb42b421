//! 决策服务 prompt 模板（确定性：相同输入得到相同 prompt）

use std::collections::BTreeMap;

use serde_json::Value;

use crate::tools::ToolKind;

pub const SELECTION_TEMPERATURE: f32 = 0.1;
pub const ANALYSIS_TEMPERATURE: f32 = 0.3;

/// 工具选择 prompt；tools 为 (name, description) 列表
pub fn tool_selection(question: &str, tools: &[(String, String)]) -> String {
    let tools_description = tools
        .iter()
        .map(|(name, description)| format!("- {name}: {description}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an assistant helping to analyze e-commerce product listings.

Available tools:
{tools_description}

User's question: "{question}"

Based on the question, which tools should we call to gather the necessary data?
Return ONLY a JSON array of tool names, nothing else. For example: ["get_seller_metrics", "get_pricing_data"]

If the question is general or asks "why is my product not selling", call ALL tools.
If the question is specific (e.g., about pricing), call only relevant tools.

Response (JSON array only):"#
    )
}

/// 分析 prompt：嵌入问题与成功结果的 JSON 视图
pub fn analysis(question: &str, results: &BTreeMap<ToolKind, &Value>) -> String {
    let data_summary = serde_json::to_string_pretty(results).unwrap_or_else(|_| "{}".to_string());

    format!(
        r#"You are an expert e-commerce consultant analyzing why a product isn't selling well.

Seller's question: "{question}"

Data collected from marketplace systems:
{data_summary}

Based on this REAL data (do not make up any numbers), provide:

1. DIAGNOSIS: A clear, 2-3 sentence explanation of the main issues preventing sales. Be specific and cite the actual numbers from the data.

2. RECOMMENDATIONS: 3-5 actionable bullet points the seller can implement immediately. Each should be specific and based on the data.

Format your response as JSON:
{{
  "diagnosis": "Your diagnosis here...",
  "recommendations": [
    "First recommendation...",
    "Second recommendation...",
    "Third recommendation..."
  ]
}}

Important:
- Only reference data that was provided
- Be specific with numbers (e.g., "Your CTR is 1%, which is below the 3% benchmark")
- Use business-friendly language
- Focus on actionable items
- Prioritize the most impactful issues

Response (JSON only):"#
    )
}
