//! StageGraph：四阶段顺序流水线
//!
//! tool_selection → data_collection → analysis → recommendations。
//! 每个阶段只读当前 RequestState 并返回 StageUpdate，由 StageGraph 在阶段边界合并。
//! 阶段内的可预期问题都降级为兜底输出并记入 errors；阶段返回 Err（Analyze 重试耗尽、取消）
//! 时中止剩余阶段，并在顶层转换为结构完整的失败响应。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures_util::FutureExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::core::{
    determine_priority, extract_insights, AnalyzeRequest, AnalyzeResponse, CopilotError,
    PriorityLevel, RequestState, StageName, StageUpdate,
};
use crate::decision::DecisionClient;
use crate::tools::{ParallelCollector, ToolCatalog};

const NO_DATA_DIAGNOSIS: &str = "Unable to analyze - no data available from marketplace services.";
const NO_DATA_RECOMMENDATION: &str = "Contact support - unable to generate recommendations";

/// 流水线中的一个阶段
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> StageName;

    async fn run(&self, state: &RequestState) -> Result<StageUpdate, CopilotError>;
}

/// 阶段 1：选择工具
pub struct ToolSelectionStage {
    decision: Arc<DecisionClient>,
    catalog: Arc<ToolCatalog>,
}

impl ToolSelectionStage {
    pub fn new(decision: Arc<DecisionClient>, catalog: Arc<ToolCatalog>) -> Self {
        Self { decision, catalog }
    }
}

#[async_trait]
impl Stage for ToolSelectionStage {
    fn name(&self) -> StageName {
        StageName::ToolSelection
    }

    async fn run(&self, state: &RequestState) -> Result<StageUpdate, CopilotError> {
        let selected = self.decision.select_tools(&state.question, &self.catalog).await;
        tracing::info!(stage = %self.name(), tools = selected.len(), "stage complete");
        Ok(StageUpdate {
            selected_tools: Some(selected),
            ..StageUpdate::new(self.name())
        })
    }
}

/// 阶段 2：并行采集
pub struct DataCollectionStage {
    collector: Arc<ParallelCollector>,
}

impl DataCollectionStage {
    pub fn new(collector: Arc<ParallelCollector>) -> Self {
        Self { collector }
    }
}

#[async_trait]
impl Stage for DataCollectionStage {
    fn name(&self) -> StageName {
        StageName::DataCollection
    }

    async fn run(&self, state: &RequestState) -> Result<StageUpdate, CopilotError> {
        let collection = self
            .collector
            .collect_all(&state.listing_id, &state.selected_tools)
            .await;
        tracing::info!(
            stage = %self.name(),
            successful = collection.successful_count,
            total = collection.total_attempted,
            "stage complete"
        );
        Ok(StageUpdate {
            tool_results: Some(collection.results),
            successful_count: Some(collection.successful_count),
            total_tools: Some(collection.total_attempted),
            errors: collection.errors,
            ..StageUpdate::new(self.name())
        })
    }
}

/// 阶段 3：诊断与关键洞察
pub struct AnalysisStage {
    decision: Arc<DecisionClient>,
}

impl AnalysisStage {
    pub fn new(decision: Arc<DecisionClient>) -> Self {
        Self { decision }
    }
}

#[async_trait]
impl Stage for AnalysisStage {
    fn name(&self) -> StageName {
        StageName::Analysis
    }

    async fn run(&self, state: &RequestState) -> Result<StageUpdate, CopilotError> {
        let results = state.successful_results();
        if results.is_empty() {
            tracing::warn!(stage = %self.name(), "no successful data to analyze");
            return Ok(StageUpdate {
                diagnosis: Some(NO_DATA_DIAGNOSIS.to_string()),
                key_insights: Some(Vec::new()),
                errors: vec!["No successful tool results to analyze".to_string()],
                ..StageUpdate::new(self.name())
            });
        }

        let reply = self.decision.analyze(&state.question, &results).await?;
        let insights = extract_insights(&results);
        tracing::info!(stage = %self.name(), insights = insights.len(), "stage complete");

        Ok(StageUpdate {
            diagnosis: Some(reply.diagnosis.clone()),
            key_insights: Some(insights),
            analysis: Some(reply),
            ..StageUpdate::new(self.name())
        })
    }
}

/// 阶段 4：建议与优先级；复用 Analysis 阶段的回复，缺失时才再调用一次决策服务
pub struct RecommendationStage {
    decision: Arc<DecisionClient>,
}

impl RecommendationStage {
    pub fn new(decision: Arc<DecisionClient>) -> Self {
        Self { decision }
    }
}

#[async_trait]
impl Stage for RecommendationStage {
    fn name(&self) -> StageName {
        StageName::Recommendations
    }

    async fn run(&self, state: &RequestState) -> Result<StageUpdate, CopilotError> {
        let results = state.successful_results();
        if results.is_empty() {
            tracing::warn!(stage = %self.name(), "no data available for recommendations");
            return Ok(StageUpdate {
                recommendations: Some(vec![NO_DATA_RECOMMENDATION.to_string()]),
                priority_level: Some(PriorityLevel::High),
                errors: vec!["No data available for recommendations".to_string()],
                ..StageUpdate::new(self.name())
            });
        }

        let reply = match &state.analysis {
            Some(cached) => cached.clone(),
            None => self.decision.analyze(&state.question, &results).await?,
        };
        let priority = determine_priority(&state.key_insights, &results);
        tracing::info!(
            stage = %self.name(),
            recommendations = reply.recommendations.len(),
            priority = %priority,
            "stage complete"
        );

        Ok(StageUpdate {
            recommendations: Some(reply.recommendations),
            priority_level: Some(priority),
            ..StageUpdate::new(self.name())
        })
    }
}

/// 工作流图中的一步
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStep {
    pub stage: u8,
    pub node: &'static str,
    pub input: &'static str,
    pub output: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageStatus {
    pub framework: &'static str,
    pub graph_nodes: Vec<&'static str>,
    pub workflow_type: &'static str,
    pub status: &'static str,
}

/// 固定四阶段的编排器；进程内共享，不持有任何请求级状态
pub struct StageGraph {
    stages: Vec<Box<dyn Stage>>,
    catalog: Arc<ToolCatalog>,
}

impl StageGraph {
    pub fn new(decision: Arc<DecisionClient>, collector: Arc<ParallelCollector>) -> Self {
        let catalog = Arc::clone(collector.catalog());
        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(ToolSelectionStage::new(
                Arc::clone(&decision),
                Arc::clone(&catalog),
            )),
            Box::new(DataCollectionStage::new(collector)),
            Box::new(AnalysisStage::new(Arc::clone(&decision))),
            Box::new(RecommendationStage::new(decision)),
        ];
        Self { stages, catalog }
    }

    /// 自定义阶段实现（须按 tool_selection → recommendations 的顺序各一个）
    pub fn from_stages(
        stages: [Box<dyn Stage>; 4],
        catalog: Arc<ToolCatalog>,
    ) -> Result<Self, CopilotError> {
        let names: Vec<StageName> = stages.iter().map(|s| s.name()).collect();
        if names != StageName::ALL {
            return Err(CopilotError::Config(format!(
                "stages must be {:?}, got {:?}",
                StageName::ALL,
                names
            )));
        }
        Ok(Self {
            stages: stages.into(),
            catalog,
        })
    }

    pub fn catalog(&self) -> &Arc<ToolCatalog> {
        &self.catalog
    }

    /// 执行整条流水线；总是返回结构完整的响应
    pub async fn run(&self, request: &AnalyzeRequest, cancel: CancellationToken) -> AnalyzeResponse {
        let span = tracing::info_span!(
            "pipeline",
            request_id = %Uuid::new_v4(),
            listing_id = %request.listing_id
        );

        async {
            let start = Instant::now();
            tracing::info!(question = %request.question, "starting workflow");

            let state = RequestState::new(&request.listing_id, &request.question);
            match self.drive(state, &cancel).await {
                Ok(state) => {
                    let elapsed = start.elapsed();
                    tracing::info!(
                        elapsed_ms = elapsed.as_millis() as u64,
                        tools = state.selected_tools.len(),
                        successful = state.successful_count,
                        total = state.total_tools,
                        insights = state.key_insights.len(),
                        recommendations = state.recommendations.len(),
                        priority = %state.priority_level,
                        "workflow complete"
                    );
                    AnalyzeResponse::from_state(state, elapsed)
                }
                Err(e) => {
                    tracing::error!(error = %e, "workflow failed");
                    AnalyzeResponse::failure(request, &e.to_string(), start.elapsed())
                }
            }
        }
        .instrument(span)
        .await
    }

    /// 依次执行各阶段并合并增量；取消时当前阶段的未完成工作被丢弃，不写入状态
    async fn drive(
        &self,
        mut state: RequestState,
        cancel: &CancellationToken,
    ) -> Result<RequestState, CopilotError> {
        for stage in &self.stages {
            debug_assert_eq!(state.phase().stage(), Some(stage.name()));
            tracing::debug!(stage = %stage.name(), "stage start");

            let update = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::warn!(stage = %stage.name(), "cancelled");
                    return Err(CopilotError::Cancelled);
                }
                result = AssertUnwindSafe(stage.run(&state)).catch_unwind() => {
                    result.map_err(|payload| CopilotError::StagePanicked {
                        stage: stage.name().to_string(),
                        message: panic_message(payload.as_ref()),
                    })??
                }
            };
            state.apply(update);
        }
        Ok(state)
    }

    pub fn describe(&self) -> Vec<WorkflowStep> {
        vec![
            WorkflowStep {
                stage: 1,
                node: StageName::ToolSelection.node(),
                input: "question",
                output: "selected_tools",
                description: "Decides which marketplace tools to call",
            },
            WorkflowStep {
                stage: 2,
                node: StageName::DataCollection.node(),
                input: "selected_tools + listing_id",
                output: "tool_results",
                description: "Executes tools in parallel and gathers data",
            },
            WorkflowStep {
                stage: 3,
                node: StageName::Analysis.node(),
                input: "tool_results + question",
                output: "diagnosis + key_insights",
                description: "Analyzes data and identifies issues",
            },
            WorkflowStep {
                stage: 4,
                node: StageName::Recommendations.node(),
                input: "diagnosis + key_insights",
                output: "recommendations + priority",
                description: "Generates actionable recommendations",
            },
        ]
    }

    pub fn status(&self) -> StageStatus {
        StageStatus {
            framework: "StageGraph",
            graph_nodes: self.stages.iter().map(|s| s.name().node()).collect(),
            workflow_type: "sequential",
            status: "ready",
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RetryPolicy;
    use crate::llm::ScriptedLlmClient;
    use crate::tools::{FetchOutcome, MockMarketplace, ToolKind};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn graph(llm: Arc<ScriptedLlmClient>) -> StageGraph {
        let d = Duration::from_millis(1);
        let catalog = Arc::new(ToolCatalog::new(
            Arc::new(MockMarketplace::new()),
            RetryPolicy::fetch(d, d),
        ));
        let collector = Arc::new(ParallelCollector::new(catalog, Duration::from_secs(5)));
        let decision = Arc::new(DecisionClient::new(llm, RetryPolicy::oracle(d, d)));
        StageGraph::new(decision, collector)
    }

    const ANALYSIS: &str = r#"{"diagnosis": "Overpriced and slow.", "recommendations": ["Cut price", "Ship faster"]}"#;

    #[tokio::test]
    async fn test_full_run_reuses_analysis_reply() {
        let llm = Arc::new(ScriptedLlmClient::with_replies([
            r#"["get_pricing_data", "get_fulfillment_data"]"#,
            ANALYSIS,
        ]));
        let graph = graph(llm.clone());
        let resp = graph
            .run(&AnalyzeRequest::new("listing_001", "Why no sales?"), CancellationToken::new())
            .await;

        assert_eq!(resp.diagnosis, "Overpriced and slow.");
        assert_eq!(resp.recommendations, vec!["Cut price", "Ship faster"]);
        assert_eq!(resp.tools_used, vec!["get_pricing_data", "get_fulfillment_data"]);
        assert_eq!(resp.metadata.stages_completed, StageName::ALL.to_vec());
        assert_eq!(resp.metadata.successful_count, 2);
        assert_eq!(resp.metadata.total_tools, 2);
        assert_eq!(resp.metadata.priority_level, PriorityLevel::Medium);
        assert!(resp.metadata.errors.is_empty());
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn test_recommendation_calls_oracle_without_cached_reply() {
        let llm = Arc::new(ScriptedLlmClient::with_replies([ANALYSIS]));
        let graph = graph(llm.clone());
        let stage = RecommendationStage::new(Arc::new(DecisionClient::new(
            llm.clone(),
            RetryPolicy::oracle(Duration::from_millis(1), Duration::from_millis(1)),
        )));
        let mut state = RequestState::new("listing_002", "q");
        state.tool_results = BTreeMap::from([(
            ToolKind::Pricing,
            FetchOutcome::Success {
                data: serde_json::json!({"price_percentile": 35.0}),
            },
        )]);

        let update = stage.run(&state).await.unwrap();
        assert_eq!(update.recommendations.unwrap(), vec!["Cut price", "Ship faster"]);
        assert_eq!(update.priority_level, Some(PriorityLevel::Low));
        assert_eq!(llm.calls(), 1);
        assert_eq!(graph.status().graph_nodes.len(), 4);
    }

    #[test]
    fn test_describe_and_status() {
        let graph = graph(Arc::new(ScriptedLlmClient::default()));
        let steps = graph.describe();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].node, "tool_selector");
        assert_eq!(steps[3].node, "recommender");

        let status = graph.status();
        assert_eq!(
            status.graph_nodes,
            vec!["tool_selector", "data_collector", "analyst", "recommender"]
        );
        assert_eq!(status.workflow_type, "sequential");
    }
}
