//! 单工具拉取器
//!
//! 持有数据源与重试策略，fetch(listing_id) 在策略内调用数据源（仅超时重试），成功后做归一化；
//! 任何失败都转为 FetchOutcome::Failure，不向上抛错。每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::Instant;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::core::{FetchError, RetryPolicy};
use crate::tools::normalize::normalize;
use crate::tools::{DataSource, ToolKind};

/// 单个工具的拉取结果：成功（归一化数据）或失败（错误文本），二者互斥
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success { data: Value },
    Failure { error: String },
}

impl FetchOutcome {
    pub fn failure(error: impl Into<String>) -> Self {
        FetchOutcome::Failure {
            error: error.into(),
        }
    }

    /// 拉取层面成功
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }

    /// 应用层面成功时的数据：拉取成功、数据非空，且数据本身没有 `"success": false`
    pub fn usable_data(&self) -> Option<&Value> {
        let FetchOutcome::Success { data } = self else {
            return None;
        };
        let empty = match data {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::String(s) => s.is_empty(),
            _ => false,
        };
        let flagged_failed = data.get("success").and_then(Value::as_bool) == Some(false);
        if empty || flagged_failed {
            None
        } else {
            Some(data)
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FetchOutcome::Failure { error } => Some(error),
            FetchOutcome::Success { .. } => None,
        }
    }
}

/// 序列化为 `{"success": bool, "data": ..., "error": ...}`
impl Serialize for FetchOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        match self {
            FetchOutcome::Success { data } => {
                map.serialize_entry("success", &self.usable_data().is_some())?;
                map.serialize_entry("data", data)?;
                map.serialize_entry("error", &Option::<String>::None)?;
            }
            FetchOutcome::Failure { error } => {
                map.serialize_entry("success", &false)?;
                map.serialize_entry("data", &Value::Null)?;
                map.serialize_entry("error", error)?;
            }
        }
        map.end()
    }
}

/// 单工具拉取器：数据源 + 重试策略 + 归一化
pub struct Fetcher {
    kind: ToolKind,
    source: Arc<dyn DataSource>,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(kind: ToolKind, source: Arc<dyn DataSource>, policy: RetryPolicy) -> Self {
        Self {
            kind,
            source,
            policy,
        }
    }

    pub fn kind(&self) -> ToolKind {
        self.kind
    }

    pub async fn fetch(&self, listing_id: &str) -> FetchOutcome {
        let start = Instant::now();
        tracing::info!(tool = %self.kind, listing_id, "executing tool");

        let result = self
            .policy
            .run(
                |attempt| {
                    tracing::debug!(tool = %self.kind, attempt, "fetch attempt");
                    self.source.fetch(self.kind, listing_id)
                },
                |e: &FetchError| e.is_transient(),
            )
            .await;

        let (outcome, attempts, label) = match result {
            Ok(raw) => (
                FetchOutcome::Success {
                    data: normalize(self.kind, raw),
                },
                None,
                "ok",
            ),
            Err(failure) => {
                let label = if failure.error.is_transient() {
                    "timeout"
                } else {
                    "error"
                };
                (
                    FetchOutcome::failure(failure.error.outcome_message()),
                    Some(failure.attempts),
                    label,
                )
            }
        };

        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": self.kind.name(),
            "listing_id": listing_id,
            "ok": outcome.is_success(),
            "outcome": label,
            "attempts": attempts,
            "duration_ms": start.elapsed().as_millis() as u64,
        });
        if outcome.is_success() {
            tracing::info!(audit = %audit, "tool");
        } else {
            tracing::warn!(audit = %audit, "tool");
        }

        outcome
    }
}
