//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock / Scripted）实现 LlmClient：complete（非流式文本完成）。
//! 决策服务只被当作“文本进、文本出”的黑盒，输出格式由 DecisionClient 校验。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use crate::core::LlmError;

/// 消息角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成，返回首条回复文本
    async fn complete(&self, messages: &[Message], temperature: f32) -> Result<String, LlmError>;

    /// 服务与模型是否可用（健康检查用），默认认为可用
    async fn is_available(&self) -> bool {
        true
    }

    /// 后端名称（日志与状态展示）
    fn name(&self) -> &str;
}
