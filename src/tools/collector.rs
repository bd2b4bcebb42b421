//! 并行采集器：对选中的工具并发拉取，汇总结果
//!
//! 每个工具一个 tokio 任务，带单工具时限；任务 panic、超时都只影响自己那一项（记为 Failure）。
//! 全部任务结束后才返回（fan-in 屏障）；采集被丢弃（如请求取消）时，未完成的任务会被 abort。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::task::AbortHandle;

use crate::tools::{FetchOutcome, ToolCatalog, ToolKind};

/// 一次采集的汇总
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    /// 键恰为实际尝试的工具
    pub results: BTreeMap<ToolKind, FetchOutcome>,
    /// 应用层面成功的工具数
    pub successful_count: usize,
    /// 实际尝试（已解析）的工具数
    pub total_attempted: usize,
    /// 失败信息，按完成顺序
    pub errors: Vec<String>,
}

/// 丢弃时 abort 所有仍在运行的拉取任务
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// 并行采集器
pub struct ParallelCollector {
    catalog: Arc<ToolCatalog>,
    fetch_deadline: Duration,
}

impl ParallelCollector {
    pub fn new(catalog: Arc<ToolCatalog>, fetch_deadline: Duration) -> Self {
        Self {
            catalog,
            fetch_deadline,
        }
    }

    pub fn catalog(&self) -> &Arc<ToolCatalog> {
        &self.catalog
    }

    /// 解析工具名并去重，未知名称记日志后丢弃
    fn resolve<S: AsRef<str>>(&self, requested: &[S]) -> Vec<ToolKind> {
        let mut kinds = Vec::with_capacity(requested.len());
        for name in requested {
            match self.catalog.lookup(name.as_ref()) {
                Ok(desc) if !kinds.contains(&desc.kind) => kinds.push(desc.kind),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "dropping unresolved tool"),
            }
        }
        kinds
    }

    pub async fn collect_all<S: AsRef<str>>(&self, listing_id: &str, requested: &[S]) -> Collection {
        if requested.is_empty() {
            tracing::error!(listing_id, "no tools selected");
            return Collection {
                errors: vec!["No tools were selected".to_string()],
                ..Collection::default()
            };
        }

        let kinds = self.resolve(requested);
        tracing::info!(listing_id, tools = kinds.len(), "executing tools in parallel");

        let mut pending = FuturesUnordered::new();
        let mut guard = AbortOnDrop(Vec::with_capacity(kinds.len()));
        for kind in &kinds {
            let kind = *kind;
            let fetcher = Arc::clone(&self.catalog.get(kind).fetcher);
            let listing = listing_id.to_string();
            let deadline = self.fetch_deadline;
            let handle = tokio::spawn(async move {
                tokio::time::timeout(deadline, fetcher.fetch(&listing)).await
            });
            guard.0.push(handle.abort_handle());
            pending.push(async move { (kind, handle.await) });
        }

        let mut collection = Collection {
            total_attempted: kinds.len(),
            ..Collection::default()
        };
        while let Some((kind, joined)) = pending.next().await {
            let outcome = match joined {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(_elapsed)) => FetchOutcome::failure(format!(
                    "Fetch exceeded deadline of {}s",
                    self.fetch_deadline.as_secs_f64()
                )),
                Err(join_err) => {
                    FetchOutcome::failure(format!("Unexpected error: task failed: {join_err}"))
                }
            };

            if let Some(err) = outcome.error() {
                tracing::error!(tool = %kind, error = err, "tool failed");
                collection.errors.push(format!("{kind}: {err}"));
            } else if outcome.usable_data().is_some() {
                collection.successful_count += 1;
                tracing::info!(tool = %kind, "tool completed");
            }
            collection.results.insert(kind, outcome);
        }
        drop(guard);

        tracing::info!(
            listing_id,
            successful = collection.successful_count,
            total = collection.total_attempted,
            "data collection complete"
        );
        collection
    }
}
