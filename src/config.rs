//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `COPILOT__*` 覆盖（双下划线表示嵌套，如 `COPILOT__LLM__MODEL=llama3`）。
//! 各段均拒绝未知键，只识别下列枚举的配置项。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerSection,
    pub llm: LlmSection,
    pub services: ServicesSection,
    pub retry: RetrySection,
    pub log: LogSection,
    pub mock: MockSection,
}

/// [server] 段：API 监听地址
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// [llm] 段：决策服务（OpenAI 兼容端点，默认指向本地 Ollama）
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmSection {
    /// 后端：openai（任意 OpenAI 兼容端点）/ mock（离线）
    pub provider: String,
    pub base_url: String,
    pub model: String,
    /// 未设置时读取 OPENAI_API_KEY
    pub api_key: Option<String>,
    /// 单次调用超时（秒）
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "http://localhost:11434/v1".to_string(),
            model: "llama3".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

impl LlmSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// [services] 段：数据服务地址与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServicesSection {
    pub base_url: String,
    /// 单次 HTTP 请求超时（秒），超时会被重试
    pub timeout_secs: u64,
    /// 单个工具的总时限（含重试），超出记为 Failure
    pub fetch_deadline_secs: u64,
}

impl Default for ServicesSection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout_secs: 10,
            fetch_deadline_secs: 45,
        }
    }
}

impl ServicesSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn fetch_deadline(&self) -> Duration {
        Duration::from_secs(self.fetch_deadline_secs)
    }
}

/// [retry] 段：指数退避的时间单位与上限（毫秒）
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
        }
    }
}

impl RetrySection {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// [log] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSection {
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// [mock] 段：Mock 数据服务端口
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MockSection {
    pub port: u16,
}

impl Default for MockSection {
    fn default() -> Self {
        Self { port: 8001 }
    }
}

/// 从 config 目录加载配置，环境变量 COPILOT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 COPILOT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("COPILOT")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.llm.model, "llama3");
        assert_eq!(cfg.services.timeout(), Duration::from_secs(10));
        assert_eq!(cfg.retry.base_delay(), Duration::from_secs(1));
        assert_eq!(cfg.retry.max_delay(), Duration::from_secs(10));
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("copilot.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "[llm]\nmodel = \"mistral\"\n\n[services]\nbase_url = \"http://data:9000\"\ntimeout_secs = 3"
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.llm.model, "mistral");
        assert_eq!(cfg.services.base_url, "http://data:9000");
        assert_eq!(cfg.services.timeout_secs, 3);
        // 未出现的段保持默认
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.services.fetch_deadline_secs, 45);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[llm]\ntemperature = 0.7\n").unwrap();

        assert!(load_config(Some(path)).is_err());
    }
}
