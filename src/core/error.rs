//! 错误类型
//!
//! 数据拉取错误（FetchError）按是否瞬时区分重试；决策服务错误（LlmError）在 DecisionClient 内重试；
//! CopilotError 是编排层对外可见的错误，只有 OracleExhausted 会中止整条流水线。

use thiserror::Error;

/// 数据服务调用错误（按分类决定是否重试）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Request timeout - service unavailable")]
    Timeout,

    #[error("HTTP 404: {0}")]
    NotFound(String),

    #[error("HTTP {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("HTTP {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// 只有超时视为瞬时错误，其余分类立即返回不重试
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Timeout)
    }

    /// 写入 Failure 结果的错误文本
    pub fn outcome_message(&self) -> String {
        match self {
            FetchError::Timeout
            | FetchError::NotFound(_)
            | FetchError::ServerError { .. }
            | FetchError::BadStatus { .. } => self.to_string(),
            FetchError::Decode(msg) | FetchError::Other(msg) => {
                format!("Unexpected error: {msg}")
            }
        }
    }
}

/// 决策服务（LLM）调用错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("LLM request timed out")]
    Timeout,

    #[error("LLM API error: {0}")]
    Api(String),

    #[error("LLM returned an empty response")]
    EmptyResponse,
}

/// 编排层错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CopilotError {
    /// 入站请求不合法，流水线启动前拒绝
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Analyze 重试耗尽，整条流水线中止
    #[error("LLM analysis failed after {attempts} attempts: {source}")]
    OracleExhausted { attempts: u32, source: LlmError },

    #[error("Request cancelled")]
    Cancelled,

    /// 阶段执行中 panic，按阶段失败处理
    #[error("Stage {stage} panicked: {message}")]
    StagePanicked { stage: String, message: String },

    #[error("Config error: {0}")]
    Config(String),
}
