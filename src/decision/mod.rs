//! DecisionClient：决策服务（LLM）的两项能力
//!
//! - select_tools：选择要调用的工具。任何失败都退回到全部工具，永不让请求失败。
//! - analyze：生成 diagnosis + recommendations。解析失败返回固定兜底；重试耗尽则向上传播 OracleExhausted。
//!
//! 两项调用各自按 RetryPolicy 重试（默认 2 次）；解析发生在重试之外，格式错误不会触发重试。

pub mod parse;
pub mod prompts;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{CopilotError, RetryPolicy};
use crate::llm::{LlmClient, LlmError, Message};
use crate::tools::{ToolCatalog, ToolKind};

pub use parse::OracleParseError;

/// 分析回复：恰好两个键
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisReply {
    pub diagnosis: String,
    pub recommendations: Vec<String>,
}

impl AnalysisReply {
    /// 回复无法解析时的固定兜底
    pub fn fallback() -> Self {
        Self {
            diagnosis: "Unable to generate detailed analysis due to parsing error. Please review the data manually."
                .to_string(),
            recommendations: vec![
                "Review your listing's performance metrics".to_string(),
                "Compare your pricing with competitors".to_string(),
                "Optimize your product keywords and title".to_string(),
            ],
        }
    }
}

pub struct DecisionClient {
    llm: Arc<dyn LlmClient>,
    policy: RetryPolicy,
}

impl DecisionClient {
    pub fn new(llm: Arc<dyn LlmClient>, policy: RetryPolicy) -> Self {
        Self { llm, policy }
    }

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    /// 单条 user 消息的完成调用，带重试
    async fn ask(&self, prompt: &str, temperature: f32) -> Result<String, (LlmError, u32)> {
        let messages = [Message::user(prompt)];
        self.policy
            .run(
                |attempt| {
                    tracing::debug!(llm = self.llm.name(), attempt, "oracle call");
                    self.llm.complete(&messages, temperature)
                },
                |_: &LlmError| true,
            )
            .await
            .map_err(|f| (f.error, f.attempts))
    }

    /// 选择工具；结果中的每一项都在目录中，且不为空
    pub async fn select_tools(&self, question: &str, catalog: &ToolCatalog) -> Vec<ToolKind> {
        let prompt = prompts::tool_selection(question, &catalog.tool_descriptions());
        tracing::info!(question, "requesting tool selection");

        let names = match self.ask(&prompt, prompts::SELECTION_TEMPERATURE).await {
            Ok(reply) => match parse::tool_names(&reply) {
                Ok(names) => names,
                Err(e) => {
                    tracing::warn!(error = %e, "unparseable tool selection, using all tools");
                    Vec::new()
                }
            },
            Err((e, attempts)) => {
                tracing::warn!(error = %e, attempts, "tool selection failed, using all tools");
                Vec::new()
            }
        };

        let mut selected: Vec<ToolKind> = Vec::with_capacity(names.len());
        for name in &names {
            match catalog.lookup(name) {
                Ok(desc) if !selected.contains(&desc.kind) => selected.push(desc.kind),
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "dropping selected tool"),
            }
        }

        if selected.is_empty() {
            tracing::warn!("no valid tools selected, using all tools");
            return catalog.kinds();
        }
        tracing::info!(tools = ?selected, "tools selected");
        selected
    }

    /// 基于成功结果生成诊断与建议
    pub async fn analyze(
        &self,
        question: &str,
        results: &BTreeMap<ToolKind, &Value>,
    ) -> Result<AnalysisReply, CopilotError> {
        let prompt = prompts::analysis(question, results);
        tracing::info!(sources = results.len(), "requesting analysis");

        let reply = self
            .ask(&prompt, prompts::ANALYSIS_TEMPERATURE)
            .await
            .map_err(|(source, attempts)| {
                tracing::error!(error = %source, attempts, "analysis failed");
                CopilotError::OracleExhausted { attempts, source }
            })?;

        match parse::analysis_reply(&reply) {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                tracing::warn!(error = %e, "unparseable analysis, using fallback");
                Ok(AnalysisReply::fallback())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use crate::tools::MockMarketplace;
    use std::time::Duration;

    fn catalog() -> ToolCatalog {
        let d = Duration::from_millis(1);
        ToolCatalog::new(Arc::new(MockMarketplace::new()), RetryPolicy::fetch(d, d))
    }

    fn client(llm: Arc<ScriptedLlmClient>) -> DecisionClient {
        let d = Duration::from_millis(1);
        DecisionClient::new(llm, RetryPolicy::oracle(d, d))
    }

    #[tokio::test]
    async fn test_fenced_selection() {
        let llm = Arc::new(ScriptedLlmClient::with_replies([
            "```json\n[\"get_pricing_data\"]\n```",
        ]));
        let selected = client(llm.clone()).select_tools("Is my price ok?", &catalog()).await;
        assert_eq!(selected, vec![ToolKind::Pricing]);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalid_names_filtered() {
        let llm = Arc::new(ScriptedLlmClient::with_replies([
            r#"["get_weather", "get_fulfillment_data", "get_fulfillment_data"]"#,
        ]));
        let selected = client(llm).select_tools("shipping?", &catalog()).await;
        assert_eq!(selected, vec![ToolKind::Fulfillment]);
    }

    #[tokio::test]
    async fn test_selection_falls_back_to_all() {
        let all = ToolKind::ALL.to_vec();

        let llm = Arc::new(ScriptedLlmClient::with_replies([r#"["get_weather"]"#]));
        assert_eq!(client(llm).select_tools("q", &catalog()).await, all);

        let llm = Arc::new(ScriptedLlmClient::with_replies(["pricing please"]));
        assert_eq!(client(llm).select_tools("q", &catalog()).await, all);

        let llm = Arc::new(ScriptedLlmClient::new(vec![
            Err(LlmError::Timeout),
            Err(LlmError::Timeout),
        ]));
        assert_eq!(client(llm.clone()).select_tools("q", &catalog()).await, all);
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn test_analyze_retries_then_succeeds() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            Err(LlmError::Api("503".into())),
            Ok(r#"{"diagnosis": "Price too high", "recommendations": ["Lower price"]}"#.into()),
        ]));
        let reply = client(llm.clone()).analyze("q", &BTreeMap::new()).await.unwrap();
        assert_eq!(reply.diagnosis, "Price too high");
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn test_analyze_parse_failure_uses_fallback() {
        let llm = Arc::new(ScriptedLlmClient::with_replies(["The listing is overpriced."]));
        let reply = client(llm.clone()).analyze("q", &BTreeMap::new()).await.unwrap();
        assert_eq!(reply, AnalysisReply::fallback());
        assert_eq!(reply.recommendations.len(), 3);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_analyze_exhaustion_propagates() {
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            Err(LlmError::Timeout),
            Err(LlmError::Timeout),
            Ok("{}".into()),
        ]));
        let err = client(llm.clone()).analyze("q", &BTreeMap::new()).await.unwrap_err();
        assert_eq!(
            err,
            CopilotError::OracleExhausted {
                attempts: 2,
                source: LlmError::Timeout
            }
        );
        assert_eq!(llm.calls(), 2);
    }
}
