//! 单元测试用的脚本化代理和模型

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AgentError, BrowserError, LlmError};
use crate::models::Credentials;
use crate::services::{AgentTask, BrowsingAgent, LanguageModel};

enum Reply {
    Answer(String),
    Fail(String),
    Panic(String),
}

struct Script {
    delay: Duration,
    reply: Reply,
}

/// 按链接预设答案的浏览代理
#[derive(Default)]
pub struct ScriptedAgent {
    scripts: HashMap<String, Script>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(self, url: &str, text: &str) -> Self {
        self.answer_after(url, text, Duration::ZERO)
    }

    pub fn answer_after(mut self, url: &str, text: &str, delay: Duration) -> Self {
        self.scripts.insert(
            url.to_string(),
            Script {
                delay,
                reply: Reply::Answer(text.to_string()),
            },
        );
        self
    }

    pub fn fail(self, url: &str, message: &str) -> Self {
        self.fail_after(url, message, Duration::ZERO)
    }

    pub fn fail_after(mut self, url: &str, message: &str, delay: Duration) -> Self {
        self.scripts.insert(
            url.to_string(),
            Script {
                delay,
                reply: Reply::Fail(message.to_string()),
            },
        );
        self
    }

    /// 代理调用直接 panic，模拟工作单元崩溃
    pub fn panic_on(mut self, url: &str, message: &str) -> Self {
        self.scripts.insert(
            url.to_string(),
            Script {
                delay: Duration::ZERO,
                reply: Reply::Panic(message.to_string()),
            },
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 同时运行的代理调用峰值
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowsingAgent for ScriptedAgent {
    async fn run(&self, task: &AgentTask, _credentials: &Credentials) -> Result<String, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let script = self.scripts.get(&task.url);
        if let Some(script) = script {
            if !script.delay.is_zero() {
                tokio::time::sleep(script.delay).await;
            }
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match script.map(|s| &s.reply) {
            Some(Reply::Answer(text)) => Ok(text.clone()),
            Some(Reply::Fail(message)) => Err(AgentError::Browser(
                BrowserError::navigation_failed(&task.url, message.clone()),
            )),
            Some(Reply::Panic(message)) => panic!("{}", message),
            None => Err(AgentError::Browser(BrowserError::navigation_failed(
                &task.url,
                "no script for url",
            ))),
        }
    }
}

type Responder = Box<dyn Fn(&str) -> Result<String, String> + Send + Sync>;

/// 按规则回复的语言模型，记录收到的提示词
pub struct ScriptedLlm {
    responder: Responder,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn with(responder: impl Fn(&str) -> Result<String, String> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// 模拟一次成功的修复：去掉提示词前缀和代码块围栏
    pub fn fence_stripping() -> Self {
        Self::with(|prompt| {
            let body = prompt.split_once(".: ").map(|(_, rest)| rest).unwrap_or(prompt);
            let body = body.trim();
            let body = body.strip_prefix("```json").unwrap_or(body);
            let body = body.strip_prefix("```").unwrap_or(body);
            let body = body.strip_suffix("```").unwrap_or(body);
            Ok(body.trim().to_string())
        })
    }

    pub fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::with(move |_| Ok(text.clone()))
    }

    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::with(move |_| Err(message.clone()))
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    async fn chat(
        &self,
        _credentials: &Credentials,
        _system_message: Option<&str>,
        user_message: &str,
    ) -> Result<String, LlmError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(user_message.to_string());
        }
        (self.responder)(user_message).map_err(|e| LlmError::api_failed("scripted", e))
    }
}
