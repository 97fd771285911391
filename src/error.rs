//! 错误类型
//!
//! 每一层一个错误枚举，批次边界统一收敛为 [`ScrapeError`]。
//! 只有二进制入口和 `App` 使用 `anyhow`。

use thiserror::Error;

/// 动态错误源
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 连接远程浏览器失败
    #[error("无法连接到浏览器 ({endpoint}): {source}")]
    ConnectionFailed {
        endpoint: String,
        #[source]
        source: BoxError,
    },
    /// 启动本地浏览器失败
    #[error("启动无头浏览器失败: {source}")]
    LaunchFailed {
        #[source]
        source: BoxError,
    },
    /// 导航失败
    #[error("导航到 {url} 失败: {source}")]
    NavigationFailed {
        url: String,
        #[source]
        source: BoxError,
    },
    /// 执行脚本失败
    #[error("执行脚本失败: {source}")]
    ScriptExecutionFailed {
        #[source]
        source: BoxError,
    },
    /// 浏览器配置失败
    #[error("浏览器配置失败: {reason}")]
    ConfigurationFailed { reason: String },
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::ScriptExecutionFailed {
            source: Box::new(err),
        }
    }
}

impl From<serde_json::Error> for BrowserError {
    fn from(err: serde_json::Error) -> Self {
        BrowserError::ScriptExecutionFailed {
            source: Box::new(err),
        }
    }
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// 构建请求失败
    #[error("构建 LLM 请求失败 (模型: {model}): {source}")]
    RequestBuildFailed {
        model: String,
        #[source]
        source: BoxError,
    },
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: BoxError,
    },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
}

/// 浏览代理错误
///
/// 代理调用本身的失败（导航、网络、自动化故障），属于硬失败。
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    /// 会话建立、导航和快照读取的总时间超限
    #[error("页面读取超时 ({url}): 超过 {secs} 秒")]
    Timeout { url: String, secs: u64 },
}

/// 批次边界错误
///
/// 任何一个链接出现此类错误，整个任务都会进入 error 状态。
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// 代理调用失败
    #[error("抓取 {url} 失败: {source}")]
    Agent {
        url: String,
        #[source]
        source: AgentError,
    },
    /// 工作单元异常退出（panic 或被中止）
    #[error("抓取 {url} 的工作单元异常退出: {reason}")]
    WorkerAborted { url: String, reason: String },
    /// 准入闸门已关闭
    #[error("准入闸门已关闭")]
    GateClosed,
}

/// 提交请求错误（传输层）
///
/// 在分配任务 ID 之前拒绝。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    /// 缺少必填字段
    #[error("缺少必填字段: {field}")]
    MissingField { field: &'static str },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 便捷构造函数 ==========

impl BrowserError {
    /// 创建浏览器连接错误
    pub fn connection_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        BrowserError::ConnectionFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        }
    }

    /// 创建导航失败错误
    pub fn navigation_failed(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        BrowserError::NavigationFailed {
            url: url.into(),
            source: source.into(),
        }
    }
}

impl LlmError {
    /// 创建 LLM API 调用错误
    pub fn api_failed(model: impl Into<String>, source: impl Into<BoxError>) -> Self {
        LlmError::ApiCallFailed {
            model: model.into(),
            source: source.into(),
        }
    }
}
