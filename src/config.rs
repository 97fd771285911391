use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use tracing::info;

use crate::error::ConfigError;

/// 默认配置文件名
const DEFAULT_CONFIG_FILE: &str = "scraper.toml";

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP / WebSocket 监听地址
    pub bind_addr: String,
    /// 全局同时进行的提取数量（跨所有任务）
    pub max_concurrent_extractions: usize,
    // --- LLM 配置 ---
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 请求未携带 openAIKey 时使用的密钥
    pub default_openai_key: Option<String>,
    // --- 浏览器配置 ---
    /// 远程浏览器端点模板，`{token}` 会被替换为会话令牌
    pub browser_ws_template: String,
    /// 请求未携带 browserless_token 时使用的令牌
    pub default_browserless_token: Option<String>,
    /// 没有令牌时是否允许启动本地无头浏览器
    pub allow_local_browser: bool,
    /// 本地浏览器可执行文件路径
    pub chrome_executable: Option<String>,
    /// 打开会话、导航并读取快照的总超时（秒）
    pub navigation_timeout_secs: u64,
    /// 提交给模型的页面文本最大字符数
    pub max_page_chars: usize,
    // --- 任务注册表 ---
    /// 终态结果无人读取时的保留时间（秒）
    pub terminal_retention_secs: u64,
    /// 每个订阅房间的广播容量
    pub notify_channel_capacity: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:45767".to_string(),
            max_concurrent_extractions: 10,
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o".to_string(),
            default_openai_key: None,
            browser_ws_template: "wss://production-sfo.browserless.io?token={token}".to_string(),
            default_browserless_token: None,
            allow_local_browser: true,
            chrome_executable: None,
            navigation_timeout_secs: 45,
            max_page_chars: 12_000,
            terminal_retention_secs: 3600,
            notify_channel_capacity: 16,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 加载配置：默认值 → TOML 文件（可选）→ 环境变量
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var("SCRAPER_CONFIG").ok();
        let base = match explicit.as_deref() {
            Some(path) => Self::from_toml_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_toml_file(DEFAULT_CONFIG_FILE)?
            }
            None => Self::default(),
        };
        base.with_env_overrides()
    }

    /// 从 TOML 文件读取配置，缺省字段使用默认值
    pub fn from_toml_file(path: &str) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadFailed {
                path: path.to_string(),
                source,
            })?;
        let config = Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.to_string(),
            source,
        })?;
        info!("已加载配置文件: {}", path);
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 用环境变量覆盖已有配置
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: env_or("BIND_ADDR", self.bind_addr)?,
            max_concurrent_extractions: env_or(
                "MAX_CONCURRENT_EXTRACTIONS",
                self.max_concurrent_extractions,
            )?,
            llm_api_base_url: env_or("LLM_API_BASE_URL", self.llm_api_base_url)?,
            llm_model_name: env_or("LLM_MODEL_NAME", self.llm_model_name)?,
            default_openai_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .or(self.default_openai_key),
            browser_ws_template: env_or("BROWSER_WS_TEMPLATE", self.browser_ws_template)?,
            default_browserless_token: std::env::var("BROWSERLESS_TOKEN")
                .ok()
                .or(self.default_browserless_token),
            allow_local_browser: env_or("ALLOW_LOCAL_BROWSER", self.allow_local_browser)?,
            chrome_executable: std::env::var("CHROME_EXECUTABLE")
                .ok()
                .or(self.chrome_executable),
            navigation_timeout_secs: env_or(
                "NAVIGATION_TIMEOUT_SECS",
                self.navigation_timeout_secs,
            )?,
            max_page_chars: env_or("MAX_PAGE_CHARS", self.max_page_chars)?,
            terminal_retention_secs: env_or(
                "TERMINAL_RETENTION_SECS",
                self.terminal_retention_secs,
            )?,
            notify_channel_capacity: env_or(
                "NOTIFY_CHANNEL_CAPACITY",
                self.notify_channel_capacity,
            )?,
            verbose_logging: env_or("VERBOSE_LOGGING", self.verbose_logging)?,
        })
    }
}

/// 读取环境变量，不存在时返回默认值，存在但无法解析时报错
fn env_or<T: FromStr>(var_name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: std::any::type_name::<T>().to_string(),
            }),
        Err(_) => Ok(default),
    }
}
