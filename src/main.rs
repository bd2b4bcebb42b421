//! Seller Copilot API 服务
//!
//! 启动: cargo run（默认 bin）。配置见 config/default.toml，环境变量 COPILOT__* 可覆盖。

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use seller_copilot::config::load_config;
use seller_copilot::server::{router, ServerState};
use seller_copilot::{observability, Copilot};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = load_config(None).context("Failed to load config")?;
    observability::init(&cfg.log.level);

    let copilot = Arc::new(Copilot::from_config(&cfg).context("Failed to build copilot")?);

    if copilot.llm_available().await {
        tracing::info!(model = %cfg.llm.model, "LLM is available");
    } else {
        tracing::warn!(
            base_url = %cfg.llm.base_url,
            model = %cfg.llm.model,
            "LLM is not available; analysis requests will fail until it is reachable"
        );
    }
    let status = copilot.graph().status();
    tracing::info!(
        framework = status.framework,
        workflow = status.workflow_type,
        nodes = ?status.graph_nodes,
        "pipeline ready"
    );

    let app = router(Arc::new(ServerState::new(copilot)));
    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .context("Invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("API ready at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}
