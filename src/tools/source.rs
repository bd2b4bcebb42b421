//! 数据源：按 (工具, listing) 拉取原始 JSON 记录
//!
//! HttpDataSource 对四个数据服务发 GET 请求，并把失败归类为 FetchError（超时 / 404 / 5xx / 其他状态 / 解码）。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::core::FetchError;
use crate::tools::ToolKind;

/// 数据拉取能力：(toolName, listingID) -> 结构化记录 | 分类错误
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch(&self, tool: ToolKind, listing_id: &str) -> Result<Value, FetchError>;
}

/// 通过 HTTP 访问数据服务
pub struct HttpDataSource {
    client: Client,
    base_url: String,
}

impl HttpDataSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("seller-copilot/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, tool: ToolKind, listing_id: &str) -> String {
        format!("{}{}", self.base_url, tool.endpoint(listing_id))
    }
}

fn classify_request_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Other(err.to_string())
    }
}

fn classify_status(status: StatusCode, body: String) -> FetchError {
    if status == StatusCode::NOT_FOUND {
        FetchError::NotFound(body)
    } else if status.is_server_error() {
        FetchError::ServerError {
            status: status.as_u16(),
            body,
        }
    } else {
        FetchError::BadStatus {
            status: status.as_u16(),
            body,
        }
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn fetch(&self, tool: ToolKind, listing_id: &str) -> Result<Value, FetchError> {
        let url = self.url_for(tool, listing_id);
        tracing::debug!(tool = %tool, url = %url, "data service request");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let body = resp.text().await.map_err(classify_request_error)?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_each_tool() {
        let source = HttpDataSource::new("http://localhost:8001/", Duration::from_secs(1));
        assert_eq!(
            source.url_for(ToolKind::SellerMetrics, "listing_001"),
            "http://localhost:8001/seller-metrics/metrics/listing_001"
        );
        assert_eq!(
            source.url_for(ToolKind::Fulfillment, "x"),
            "http://localhost:8001/fulfillment/fulfillment/x"
        );
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, "missing".into()),
            FetchError::NotFound("missing".into())
        );
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, String::new()),
            FetchError::ServerError { status: 502, .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY, String::new()),
            FetchError::BadStatus { status: 422, .. }
        ));
    }
}
