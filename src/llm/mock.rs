//! Mock / Scripted LLM 客户端（离线运行与测试，无需 API）
//!
//! - MockLlmClient：确定性离线决策，工具选择时返回 prompt 中列出的全部工具，分析时返回固定格式的 JSON。
//! - ScriptedLlmClient：按顺序回放预设回复或错误，并记录收到的 prompt。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, Message, Role};

fn last_user(messages: &[Message]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .unwrap_or("")
}

/// 离线确定性客户端
#[derive(Debug, Default)]
pub struct MockLlmClient;

impl MockLlmClient {
    /// 从 "- name: description" 行中取出工具名
    fn listed_tools(prompt: &str) -> Vec<String> {
        prompt
            .lines()
            .filter_map(|line| line.trim().strip_prefix("- "))
            .filter_map(|rest| rest.split_once(':'))
            .map(|(name, _)| name.trim())
            .filter(|name| name.starts_with("get_"))
            .map(String::from)
            .collect()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message], _temperature: f32) -> Result<String, LlmError> {
        let prompt = last_user(messages);

        if prompt.contains("JSON array") {
            let tools = Self::listed_tools(prompt);
            return serde_json::to_string(&tools).map_err(|e| LlmError::Api(e.to_string()));
        }

        let reply = serde_json::json!({
            "diagnosis": "Offline analysis: review the insights derived from the marketplace data below; no language model was consulted.",
            "recommendations": [
                "Address the issues flagged in the key insights first",
                "Compare your pricing and shipping with top competitors",
                "Refresh your listing title and keywords to improve search visibility"
            ]
        });
        Ok(reply.to_string())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// 回放客户端：依次返回预设结果，耗尽后返回 Api 错误
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlmClient {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// 便捷构造：全部为成功回复
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(replies.into_iter().map(|r| Ok(r.into())).collect())
    }

    /// 收到的 user prompt（按调用顺序）
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message], _temperature: f32) -> Result<String, LlmError> {
        if let Ok(mut p) = self.prompts.lock() {
            p.push(last_user(messages).to_string());
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| Err(LlmError::Api("no scripted reply left".to_string())))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_selects_listed_tools() {
        let prompt = "Available tools:\n- get_seller_metrics: metrics\n- get_pricing_data: pricing\n\nReturn ONLY a JSON array of tool names";
        let reply = MockLlmClient
            .complete(&[Message::user(prompt)], 0.1)
            .await
            .unwrap();
        assert_eq!(reply, r#"["get_seller_metrics","get_pricing_data"]"#);
    }

    #[tokio::test]
    async fn test_mock_analysis_is_json_object() {
        let reply = MockLlmClient
            .complete(&[Message::user("analyze this")], 0.3)
            .await
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert!(v["diagnosis"].is_string());
        assert_eq!(v["recommendations"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_scripted_replays_in_order() {
        let client = ScriptedLlmClient::new(vec![Ok("one".into()), Err(LlmError::Timeout)]);
        assert_eq!(client.complete(&[Message::user("a")], 0.0).await.unwrap(), "one");
        assert_eq!(client.complete(&[Message::user("b")], 0.0).await, Err(LlmError::Timeout));
        assert!(client.complete(&[Message::user("c")], 0.0).await.is_err());
        assert_eq!(client.prompts(), vec!["a", "b", "c"]);
        assert_eq!(client.calls(), 3);
    }
}
