//! 请求状态：流水线阶段、RequestState 与阶段增量 StageUpdate、入站请求与响应
//!
//! 每个请求独占一份 RequestState。阶段只读取当前状态并返回 StageUpdate，
//! 由 StageGraph 在阶段边界一次性合并（apply），阶段内部不会修改共享状态。

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{CopilotError, Insight};
use crate::decision::AnalysisReply;
use crate::tools::{FetchOutcome, ToolKind};

/// 流水线状态机：严格顺序，无分支无回环
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelinePhase {
    Start,
    ToolSelection,
    DataCollection,
    Analysis,
    Recommendation,
    Done,
}

impl PipelinePhase {
    pub fn next(self) -> Self {
        match self {
            PipelinePhase::Start => PipelinePhase::ToolSelection,
            PipelinePhase::ToolSelection => PipelinePhase::DataCollection,
            PipelinePhase::DataCollection => PipelinePhase::Analysis,
            PipelinePhase::Analysis => PipelinePhase::Recommendation,
            PipelinePhase::Recommendation | PipelinePhase::Done => PipelinePhase::Done,
        }
    }

    /// 该状态对应的阶段（Start / Done 没有）
    pub fn stage(self) -> Option<StageName> {
        match self {
            PipelinePhase::ToolSelection => Some(StageName::ToolSelection),
            PipelinePhase::DataCollection => Some(StageName::DataCollection),
            PipelinePhase::Analysis => Some(StageName::Analysis),
            PipelinePhase::Recommendation => Some(StageName::Recommendations),
            PipelinePhase::Start | PipelinePhase::Done => None,
        }
    }
}

/// 阶段名（写入 stages_completed 的审计记录）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    ToolSelection,
    DataCollection,
    Analysis,
    Recommendations,
}

impl StageName {
    pub const ALL: [StageName; 4] = [
        StageName::ToolSelection,
        StageName::DataCollection,
        StageName::Analysis,
        StageName::Recommendations,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StageName::ToolSelection => "tool_selection",
            StageName::DataCollection => "data_collection",
            StageName::Analysis => "analysis",
            StageName::Recommendations => "recommendations",
        }
    }

    /// 工作流图中的节点名
    pub fn node(self) -> &'static str {
        match self {
            StageName::ToolSelection => "tool_selector",
            StageName::DataCollection => "data_collector",
            StageName::Analysis => "analyst",
            StageName::Recommendations => "recommender",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityLevel {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PriorityLevel::Low => "low",
            PriorityLevel::Medium => "medium",
            PriorityLevel::High => "high",
            PriorityLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// 单个请求的共享状态
#[derive(Debug, Clone, Default)]
pub struct RequestState {
    pub listing_id: String,
    pub question: String,
    pub selected_tools: Vec<ToolKind>,
    /// 键恰为实际尝试的工具
    pub tool_results: BTreeMap<ToolKind, FetchOutcome>,
    pub successful_count: usize,
    pub total_tools: usize,
    pub diagnosis: String,
    pub key_insights: Vec<Insight>,
    /// Analysis 阶段的决策回复，Recommendation 阶段复用
    pub analysis: Option<AnalysisReply>,
    pub recommendations: Vec<String>,
    pub priority_level: PriorityLevel,
    /// 只追加
    pub errors: Vec<String>,
    /// 只追加
    pub stages_completed: Vec<StageName>,
}

impl RequestState {
    pub fn new(listing_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            listing_id: listing_id.into(),
            question: question.into(),
            ..Self::default()
        }
    }

    /// 当前所处阶段：已完成阶段的下一个
    pub fn phase(&self) -> PipelinePhase {
        let mut phase = PipelinePhase::Start.next();
        for _ in &self.stages_completed {
            phase = phase.next();
        }
        phase
    }

    /// 拉取成功、应用层成功且数据非空的结果
    pub fn successful_results(&self) -> BTreeMap<ToolKind, &Value> {
        self.tool_results
            .iter()
            .filter_map(|(kind, outcome)| outcome.usable_data().map(|data| (*kind, data)))
            .collect()
    }

    /// 合并一个阶段的增量；errors 与 stages_completed 只追加，同一阶段不会记录两次
    pub fn apply(&mut self, update: StageUpdate) {
        let StageUpdate {
            stage,
            selected_tools,
            tool_results,
            successful_count,
            total_tools,
            diagnosis,
            key_insights,
            analysis,
            recommendations,
            priority_level,
            errors,
        } = update;

        if let Some(v) = selected_tools {
            self.selected_tools = v;
        }
        if let Some(v) = tool_results {
            self.tool_results = v;
        }
        if let Some(v) = successful_count {
            self.successful_count = v;
        }
        if let Some(v) = total_tools {
            self.total_tools = v;
        }
        if let Some(v) = diagnosis {
            self.diagnosis = v;
        }
        if let Some(v) = key_insights {
            self.key_insights = v;
        }
        if analysis.is_some() {
            self.analysis = analysis;
        }
        if let Some(v) = recommendations {
            self.recommendations = v;
        }
        if let Some(v) = priority_level {
            self.priority_level = v;
        }
        self.errors.extend(errors);
        if !self.stages_completed.contains(&stage) {
            self.stages_completed.push(stage);
        }
    }
}

/// 阶段产出的增量，None 表示该字段不写
#[derive(Debug, Clone, PartialEq)]
pub struct StageUpdate {
    pub stage: StageName,
    pub selected_tools: Option<Vec<ToolKind>>,
    pub tool_results: Option<BTreeMap<ToolKind, FetchOutcome>>,
    pub successful_count: Option<usize>,
    pub total_tools: Option<usize>,
    pub diagnosis: Option<String>,
    pub key_insights: Option<Vec<Insight>>,
    pub analysis: Option<AnalysisReply>,
    pub recommendations: Option<Vec<String>>,
    pub priority_level: Option<PriorityLevel>,
    pub errors: Vec<String>,
}

impl StageUpdate {
    pub fn new(stage: StageName) -> Self {
        Self {
            stage,
            selected_tools: None,
            tool_results: None,
            successful_count: None,
            total_tools: None,
            diagnosis: None,
            key_insights: None,
            analysis: None,
            recommendations: None,
            priority_level: None,
            errors: Vec::new(),
        }
    }
}

/// 入站请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub listing_id: String,
    pub question: String,
}

impl AnalyzeRequest {
    pub fn new(listing_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            listing_id: listing_id.into(),
            question: question.into(),
        }
    }

    /// 两个字段都必须非空白
    pub fn validate(&self) -> Result<(), CopilotError> {
        if self.listing_id.trim().is_empty() {
            return Err(CopilotError::Validation(
                "listing_id cannot be empty".to_string(),
            ));
        }
        if self.question.trim().is_empty() {
            return Err(CopilotError::Validation("question cannot be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseMetadata {
    pub question: String,
    pub tool_results: BTreeMap<ToolKind, FetchOutcome>,
    pub key_insights: Vec<Insight>,
    pub priority_level: PriorityLevel,
    pub execution_time_seconds: f64,
    pub successful_count: usize,
    pub total_tools: usize,
    pub errors: Vec<String>,
    pub stages_completed: Vec<StageName>,
}

/// 对外响应：无论成功还是整体失败，结构都完整
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    pub listing_id: String,
    pub diagnosis: String,
    pub recommendations: Vec<String>,
    pub tools_used: Vec<String>,
    pub metadata: ResponseMetadata,
}

impl AnalyzeResponse {
    pub fn from_state(state: RequestState, elapsed: Duration) -> Self {
        Self {
            listing_id: state.listing_id,
            diagnosis: state.diagnosis,
            recommendations: state.recommendations,
            tools_used: state
                .selected_tools
                .iter()
                .map(|k| k.name().to_string())
                .collect(),
            metadata: ResponseMetadata {
                question: state.question,
                tool_results: state.tool_results,
                key_insights: state.key_insights,
                priority_level: state.priority_level,
                execution_time_seconds: elapsed.as_secs_f64(),
                successful_count: state.successful_count,
                total_tools: state.total_tools,
                errors: state.errors,
                stages_completed: state.stages_completed,
            },
        }
    }

    /// 流水线中止时的失败响应
    pub fn failure(request: &AnalyzeRequest, message: &str, elapsed: Duration) -> Self {
        Self {
            listing_id: request.listing_id.clone(),
            diagnosis: format!("Workflow failed: {message}"),
            recommendations: vec!["Contact support - workflow error".to_string()],
            tools_used: Vec::new(),
            metadata: ResponseMetadata {
                question: request.question.clone(),
                tool_results: BTreeMap::new(),
                key_insights: Vec::new(),
                priority_level: PriorityLevel::Critical,
                execution_time_seconds: elapsed.as_secs_f64(),
                successful_count: 0,
                total_tools: 0,
                errors: vec![message.to_string()],
                stages_completed: Vec::new(),
            },
        }
    }

    pub fn is_failure(&self) -> bool {
        self.metadata.stages_completed.is_empty() && !self.metadata.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_phase_sequence() {
        let mut phase = PipelinePhase::Start;
        let mut stages = Vec::new();
        while phase != PipelinePhase::Done {
            phase = phase.next();
            stages.extend(phase.stage());
        }
        assert_eq!(stages, StageName::ALL.to_vec());
        assert_eq!(PipelinePhase::Done.next(), PipelinePhase::Done);
    }

    #[test]
    fn test_apply_merges_and_appends() {
        let mut state = RequestState::new("listing_001", "why?");
        assert_eq!(state.phase(), PipelinePhase::ToolSelection);

        state.apply(StageUpdate {
            selected_tools: Some(vec![ToolKind::Pricing]),
            ..StageUpdate::new(StageName::ToolSelection)
        });
        state.apply(StageUpdate {
            tool_results: Some(BTreeMap::new()),
            successful_count: Some(0),
            total_tools: Some(0),
            errors: vec!["first".into()],
            ..StageUpdate::new(StageName::DataCollection)
        });
        state.apply(StageUpdate {
            errors: vec!["second".into()],
            ..StageUpdate::new(StageName::DataCollection)
        });

        assert_eq!(state.selected_tools, vec![ToolKind::Pricing]);
        assert_eq!(state.errors, vec!["first", "second"]);
        assert_eq!(
            state.stages_completed,
            vec![StageName::ToolSelection, StageName::DataCollection]
        );
        assert_eq!(state.phase(), PipelinePhase::Analysis);
    }

    #[test]
    fn test_successful_results_filter() {
        let mut state = RequestState::new("l", "q");
        state.tool_results = BTreeMap::from([
            (ToolKind::SellerMetrics, FetchOutcome::Success { data: json!({"ctr": 0.1}) }),
            (ToolKind::Pricing, FetchOutcome::Success { data: json!({}) }),
            (ToolKind::Fulfillment, FetchOutcome::failure("HTTP 500: down")),
        ]);
        let ok = state.successful_results();
        assert_eq!(ok.keys().copied().collect::<Vec<_>>(), vec![ToolKind::SellerMetrics]);
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        assert!(AnalyzeRequest::new("listing_001", "why?").validate().is_ok());
        assert_eq!(
            AnalyzeRequest::new("  ", "why?").validate(),
            Err(CopilotError::Validation("listing_id cannot be empty".into()))
        );
        assert_eq!(
            AnalyzeRequest::new("listing_001", "\n").validate(),
            Err(CopilotError::Validation("question cannot be empty".into()))
        );
    }

    #[test]
    fn test_failure_response_shape() {
        let request = AnalyzeRequest::new("listing_001", "why?");
        let resp = AnalyzeResponse::failure(&request, "boom", Duration::from_millis(5));
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["diagnosis"], "Workflow failed: boom");
        assert_eq!(v["recommendations"], json!(["Contact support - workflow error"]));
        assert_eq!(v["tools_used"], json!([]));
        assert_eq!(v["metadata"]["priority_level"], "critical");
        assert_eq!(v["metadata"]["errors"], json!(["boom"]));
        assert_eq!(v["metadata"]["stages_completed"], json!([]));
        assert_eq!(v["metadata"]["tool_results"], json!({}));
        assert!(resp.is_failure());
    }
}
