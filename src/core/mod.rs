//! 核心编排层：错误、重试策略、请求状态、洞察规则与四阶段 StageGraph

pub mod error;
pub mod insights;
pub mod orchestrator;
pub mod retry;
pub mod state;

pub use error::{CopilotError, FetchError, LlmError};
pub use insights::{determine_priority, extract_insights, Insight};
pub use orchestrator::{Stage, StageGraph, StageStatus, WorkflowStep};
pub use retry::{RetryFailure, RetryPolicy};
pub use state::{
    AnalyzeRequest, AnalyzeResponse, PipelinePhase, PriorityLevel, RequestState, ResponseMetadata,
    StageName, StageUpdate,
};
