//! 浏览代理 - 业务能力层
//!
//! 只负责"打开一个页面并回答一个问题"的能力：
//! 打开浏览器会话 → 导航 → 读取页面快照 → 交给模型作答。
//! 返回模型的最终文本答案，不做任何解析。

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info};

use crate::browser::{self, BrowserSession, BrowserSettings};
use crate::config::Config;
use crate::error::AgentError;
use crate::infrastructure::JsExecutor;
use crate::models::Credentials;
use crate::services::llm_service::LanguageModel;
use crate::utils::logging::truncate_text;

/// 单个结构化数据块的最大字符数
const MAX_STRUCTURED_BLOCK_CHARS: usize = 4_000;
/// 最多保留的结构化数据块数量
const MAX_STRUCTURED_BLOCKS: usize = 4;

const AGENT_SYSTEM_PROMPT: &str = "You are a web browsing agent. You have already navigated \
to the requested page and its current content is provided below. Complete the task using only \
this page content. Reply with the final answer only, exactly in the format the task asks for.";

/// 读取页面快照的脚本
const SNAPSHOT_JS: &str = r#"(() => {
    const structured = Array.from(
        document.querySelectorAll('script[type="application/ld+json"]')
    )
        .map((s) => s.textContent || '')
        .filter((t) => t.trim().length > 0);
    return {
        title: document.title || '',
        url: location.href,
        text: document.body ? document.body.innerText : '',
        structured_data: structured,
    };
})()"#;

static INLINE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\x{a0}]+").expect("valid regex"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*(\n[ \t]*)+").expect("valid regex"));

/// 交给代理的任务
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentTask {
    pub url: String,
    pub instruction: String,
}

impl AgentTask {
    pub fn new(url: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            instruction: instruction.into(),
        }
    }
}

/// 浏览代理能力
///
/// 失败（导航、网络、自动化故障）直接返回错误，不重试。
#[async_trait]
pub trait BrowsingAgent: Send + Sync {
    async fn run(&self, task: &AgentTask, credentials: &Credentials) -> Result<String, AgentError>;
}

/// 页面快照
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageSnapshot {
    pub title: String,
    pub url: String,
    pub text: String,
    pub structured_data: Vec<String>,
}

/// 基于 chromiumoxide 的浏览代理
pub struct ChromeAgent {
    settings: BrowserSettings,
    llm: Arc<dyn LanguageModel>,
    navigation_timeout: Duration,
    max_page_chars: usize,
}

impl ChromeAgent {
    pub fn new(config: &Config, llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            settings: BrowserSettings::from_config(config),
            llm,
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
            max_page_chars: config.max_page_chars,
        }
    }

    fn timed_out(&self, url: &str) -> AgentError {
        AgentError::Timeout {
            url: url.to_string(),
            secs: self.navigation_timeout.as_secs(),
        }
    }

    /// 导航并读取页面快照
    async fn observe(&self, session: &BrowserSession, url: &str) -> Result<PageSnapshot, AgentError> {
        let page = session.open_page(url).await?;

        let executor = JsExecutor::new(page);
        let snapshot = executor.eval_as::<PageSnapshot>(SNAPSHOT_JS).await;
        if let Err(e) = executor.close().await {
            debug!("关闭页面时出错（忽略）: {}", e);
        }
        Ok(snapshot?)
    }

    /// 打开会话并读取快照，整个过程共用一个截止时间
    async fn snapshot(
        &self,
        task: &AgentTask,
        credentials: &Credentials,
    ) -> Result<PageSnapshot, AgentError> {
        let deadline = Instant::now() + self.navigation_timeout;

        let session = timeout_at(
            deadline,
            browser::open_session(&self.settings, credentials.browserless_token.as_deref()),
        )
        .await
        .map_err(|_| self.timed_out(&task.url))??;

        // 无论观察成功与否都要关闭会话
        let observed = match timeout_at(deadline, self.observe(&session, &task.url)).await {
            Ok(result) => result,
            Err(_) => Err(self.timed_out(&task.url)),
        };
        session.close().await;
        observed
    }
}

#[async_trait]
impl BrowsingAgent for ChromeAgent {
    async fn run(&self, task: &AgentTask, credentials: &Credentials) -> Result<String, AgentError> {
        let snapshot = self.snapshot(task, credentials).await?;

        info!(
            "📄 已读取页面: {} ({} 字符)",
            truncate_text(&snapshot.title, 60),
            snapshot.text.chars().count()
        );

        let prompt = build_agent_prompt(task, &snapshot, self.max_page_chars);
        let answer = self
            .llm
            .chat(credentials, Some(AGENT_SYSTEM_PROMPT), &prompt)
            .await?;

        debug!("代理最终答案: {}", truncate_text(&answer, 200));
        Ok(answer)
    }
}

/// 压缩页面文本中的空白
pub fn normalize_page_text(text: &str) -> String {
    let collapsed = INLINE_WHITESPACE.replace_all(text, " ");
    BLANK_LINES.replace_all(&collapsed, "\n").trim().to_string()
}

fn take_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// 构建交给模型的代理提示词
pub fn build_agent_prompt(task: &AgentTask, snapshot: &PageSnapshot, max_page_chars: usize) -> String {
    let text = take_chars(&normalize_page_text(&snapshot.text), max_page_chars);

    let structured = if snapshot.structured_data.is_empty() {
        "(none)".to_string()
    } else {
        snapshot
            .structured_data
            .iter()
            .take(MAX_STRUCTURED_BLOCKS)
            .map(|block| take_chars(block.trim(), MAX_STRUCTURED_BLOCK_CHARS))
            .collect::<Vec<_>>()
            .join("\n---\n")
    };

    format!(
        "Task: {}\n\nPage title: {}\nPage URL: {}\n\nStructured data on the page:\n{}\n\nVisible page text:\n{}",
        task.instruction, snapshot.title, snapshot.url, structured, text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_page_text() {
        let raw = "Widget   Pro\t\tX\n\n\n   \nPrice:\u{a0}₹1,299\n";
        assert_eq!(normalize_page_text(raw), "Widget Pro X\nPrice: ₹1,299");
    }

    #[test]
    fn test_build_agent_prompt_truncates_text() {
        let task = AgentTask::new("https://shop.example/p", "find the price");
        let snapshot = PageSnapshot {
            title: "Widget".to_string(),
            url: "https://shop.example/p".to_string(),
            text: "a".repeat(500),
            structured_data: vec![],
        };

        let prompt = build_agent_prompt(&task, &snapshot, 100);
        assert!(prompt.starts_with("Task: find the price"));
        assert!(prompt.contains("(none)"));
        assert!(prompt.ends_with(&"a".repeat(100)));
        assert!(!prompt.contains(&"a".repeat(101)));
    }

    #[test]
    fn test_build_agent_prompt_includes_structured_data() {
        let task = AgentTask::new("https://shop.example/p", "find the price");
        let snapshot = PageSnapshot {
            structured_data: vec![r#"{"@type":"Product","name":"Widget"}"#.to_string()],
            ..PageSnapshot::default()
        };

        let prompt = build_agent_prompt(&task, &snapshot, 100);
        assert!(prompt.contains(r#""@type":"Product""#));
    }

    #[test]
    fn test_snapshot_tolerates_missing_fields() {
        let snapshot: PageSnapshot =
            serde_json::from_value(serde_json::json!({"title": "Only title"})).unwrap();
        assert_eq!(snapshot.title, "Only title");
        assert!(snapshot.structured_data.is_empty());
    }

    #[tokio::test]
    async fn test_hanging_browser_endpoint_times_out() {
        // 接受连接但从不完成握手的端点
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let config = Config {
            browser_ws_template: format!("ws://127.0.0.1:{port}?token={{token}}"),
            navigation_timeout_secs: 1,
            ..Config::default()
        };
        let llm = Arc::new(crate::test_support::ScriptedLlm::failing("unused"));
        let agent = ChromeAgent::new(&config, llm.clone());

        let task = AgentTask::new("https://shop.example/p", "find the price");
        let credentials = Credentials::new("sk-test", Some("bl-token".to_string()));
        let result = tokio::time::timeout(Duration::from_secs(10), agent.run(&task, &credentials))
            .await
            .expect("截止时间应覆盖会话建立");

        match result {
            Err(AgentError::Timeout { url, secs }) => {
                assert_eq!(url, "https://shop.example/p");
                assert_eq!(secs, 1);
            }
            other => panic!("应为超时错误，实际为 {other:?}"),
        }
        assert_eq!(llm.calls(), 0);
        server.abort();
    }

    /// 需要本地 Chromium 和 OPENAI_API_KEY
    #[tokio::test]
    #[ignore]
    async fn test_chrome_agent_live() {
        crate::logger::init();

        let key = std::env::var("OPENAI_API_KEY").expect("需要 OPENAI_API_KEY");
        let config = Config::default();
        let llm: Arc<dyn LanguageModel> = Arc::new(crate::services::LlmService::new(&config));
        let agent = ChromeAgent::new(&config, llm);

        let task = AgentTask::new(
            "https://www.rust-lang.org/",
            "Go to https://www.rust-lang.org/ and give the page headline as a json object with the key: headline.",
        );
        let answer = agent.run(&task, &Credentials::new(key, None)).await.unwrap();

        println!("代理答案: {}", answer);
        assert!(!answer.is_empty());
    }
}
