//! Mock 市场数据服务
//!
//! 启动: cargo run --bin copilot-mock-services，默认监听 8001（[mock] port）。

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use seller_copilot::config::load_config;
use seller_copilot::mock_services::router;
use seller_copilot::observability;
use seller_copilot::tools::MockMarketplace;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = load_config(None).context("Failed to load config")?;
    observability::init(&cfg.log.level);

    let app = router(Arc::new(MockMarketplace::new()));
    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.mock.port)
        .parse()
        .context("Invalid mock service address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Mock services ready at http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("Mock service error")?;
    Ok(())
}
