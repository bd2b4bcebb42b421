//! 决策服务回复解析
//!
//! 回复可能包在 ```json ... ``` 或 ``` ... ``` 代码块中，先剥离再按 JSON 解析。
//! 解析失败只在本模块内部出现，由 DecisionClient 转成确定性的兜底结果。

use serde_json::Value;
use thiserror::Error;

use crate::decision::AnalysisReply;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleParseError {
    #[error("invalid JSON in oracle reply: {0}")]
    Json(String),
}

/// 取出代码块中的内容；没有代码块时返回去掉首尾空白的原文
pub fn strip_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let body = if let Some(start) = trimmed.find("```json") {
        &trimmed[start + "```json".len()..]
    } else if let Some(start) = trimmed.find("```") {
        &trimmed[start + "```".len()..]
    } else {
        return trimmed;
    };
    body.find("```")
        .map(|end| &body[..end])
        .unwrap_or(body)
        .trim()
}

/// 解析工具名数组；非字符串元素忽略
pub fn tool_names(reply: &str) -> Result<Vec<String>, OracleParseError> {
    let payload = strip_fence(reply);
    let items: Vec<Value> = serde_json::from_str(payload)
        .map_err(|e| OracleParseError::Json(format!("{e}: {payload}")))?;
    Ok(items
        .into_iter()
        .filter_map(|v| v.as_str().map(String::from))
        .collect())
}

/// 解析 {diagnosis, recommendations}，多余或缺失的键都视为解析失败
pub fn analysis_reply(reply: &str) -> Result<AnalysisReply, OracleParseError> {
    let payload = strip_fence(reply);
    serde_json::from_str(payload).map_err(|e| OracleParseError::Json(format!("{e}: {payload}")))
}
