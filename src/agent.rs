//! Headless 运行时
//!
//! 供 HTTP API 与测试调用：从配置构建 LLM 客户端、数据源、ToolCatalog、ParallelCollector、
//! DecisionClient 与 StageGraph，全部在启动时构建一次，之后只读共享。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::{AnalyzeRequest, AnalyzeResponse, CopilotError, RetryPolicy, StageGraph};
use crate::decision::DecisionClient;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};
use crate::tools::{DataSource, HttpDataSource, MockMarketplace, ParallelCollector, ToolCatalog};

/// 按 llm.provider 选择决策服务客户端
pub fn create_llm_from_config(cfg: &AppConfig) -> Result<Arc<dyn LlmClient>, CopilotError> {
    match cfg.llm.provider.to_lowercase().as_str() {
        "openai" => {
            tracing::info!(base_url = %cfg.llm.base_url, model = %cfg.llm.model, "using OpenAI-compatible LLM");
            Ok(Arc::new(OpenAiClient::new(
                &cfg.llm.base_url,
                &cfg.llm.model,
                cfg.llm.api_key.as_deref(),
                cfg.llm.timeout(),
            )))
        }
        "mock" => {
            tracing::warn!("using offline mock LLM");
            Ok(Arc::new(MockLlmClient))
        }
        other => Err(CopilotError::Config(format!(
            "unknown llm provider '{other}' (expected openai or mock)"
        ))),
    }
}

/// 数据源：mock 模式下用进程内 fixture，否则走 HTTP
pub fn create_source_from_config(cfg: &AppConfig) -> Arc<dyn DataSource> {
    if cfg.llm.provider.eq_ignore_ascii_case("mock") {
        tracing::warn!("using in-process mock marketplace data");
        Arc::new(MockMarketplace::new())
    } else {
        tracing::info!(base_url = %cfg.services.base_url, "using marketplace HTTP services");
        Arc::new(HttpDataSource::new(
            cfg.services.base_url.clone(),
            cfg.services.timeout(),
        ))
    }
}

/// 运行时：持有 StageGraph 与决策客户端
pub struct Copilot {
    graph: StageGraph,
    decision: Arc<DecisionClient>,
}

impl Copilot {
    pub fn from_config(cfg: &AppConfig) -> Result<Self, CopilotError> {
        let llm = create_llm_from_config(cfg)?;
        let source = create_source_from_config(cfg);
        Ok(Self::with_components(llm, source, cfg))
    }

    /// 显式注入 LLM 与数据源（测试与离线运行）
    pub fn with_components(
        llm: Arc<dyn LlmClient>,
        source: Arc<dyn DataSource>,
        cfg: &AppConfig,
    ) -> Self {
        let base = cfg.retry.base_delay();
        let max = cfg.retry.max_delay();

        let catalog = Arc::new(ToolCatalog::new(source, RetryPolicy::fetch(base, max)));
        let collector = Arc::new(ParallelCollector::new(
            catalog,
            cfg.services.fetch_deadline(),
        ));
        let decision = Arc::new(DecisionClient::new(llm, RetryPolicy::oracle(base, max)));
        let graph = StageGraph::new(Arc::clone(&decision), collector);

        tracing::info!(
            llm = decision.llm().name(),
            tools = graph.catalog().all().len(),
            "copilot ready"
        );
        Self { graph, decision }
    }

    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    pub async fn llm_available(&self) -> bool {
        self.decision.llm().is_available().await
    }

    /// 校验请求后执行流水线
    pub async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalyzeResponse, CopilotError> {
        self.analyze_with_cancel(request, CancellationToken::new())
            .await
    }

    pub async fn analyze_with_cancel(
        &self,
        request: AnalyzeRequest,
        cancel: CancellationToken,
    ) -> Result<AnalyzeResponse, CopilotError> {
        request.validate()?;
        Ok(self.graph.run(&request, cancel).await)
    }
}
