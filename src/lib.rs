//! Seller Copilot - 卖家智能分析流水线
//!
//! 模块划分：
//! - **agent**: 无头运行时（从配置组装 LLM、数据源与 StageGraph）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误、重试策略、请求状态、洞察规则、四阶段编排
//! - **decision**: 决策服务封装（工具选择 / 分析，含重试与兜底）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock / Scripted）
//! - **observability**: tracing 初始化
//! - **tools**: 工具目录、数据源、拉取器、归一化、并行采集
//! - **server**: HTTP API（feature = "web"）
//! - **mock_services**: Mock 市场数据服务（feature = "web"）

pub mod agent;
pub mod config;
pub mod core;
pub mod decision;
pub mod llm;
#[cfg(feature = "web")]
pub mod mock_services;
pub mod observability;
#[cfg(feature = "web")]
pub mod server;
pub mod tools;

pub use agent::Copilot;
