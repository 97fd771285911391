//! 任务模型
//!
//! 任务标识、提交请求、生命周期状态以及对外的查询 / 推送载荷。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RequestError;
use crate::models::record::Record;

/// 任务标识（提交时生成）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// 单次请求携带的凭据
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// 模型访问密钥
    pub openai_key: String,
    /// 远程浏览器会话令牌
    pub browserless_token: Option<String>,
}

impl Credentials {
    pub fn new(openai_key: impl Into<String>, browserless_token: Option<String>) -> Self {
        Self {
            openai_key: openai_key.into(),
            browserless_token,
        }
    }
}

// 日志里不能出现密钥
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("openai_key", &"***")
            .field(
                "browserless_token",
                &self.browserless_token.as_ref().map(|_| "***"),
            )
            .finish()
    }
}

/// 请求缺省凭据（来自配置）
#[derive(Debug, Clone, Default)]
pub struct RequestDefaults {
    pub openai_key: Option<String>,
    pub browserless_token: Option<String>,
}

/// 提交载荷
///
/// `{"links": [...], "openAIKey": "...", "browserless_token": "..."}`
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitPayload {
    pub links: Vec<String>,
    #[serde(rename = "openAIKey")]
    pub openai_key: Option<String>,
    pub browserless_token: Option<String>,
}

/// 一次批量抓取提交
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    /// 输入链接，提交后不可变
    pub links: Vec<String>,
    pub credentials: Credentials,
}

impl ScrapeRequest {
    pub fn new(links: Vec<String>, credentials: Credentials) -> Self {
        Self { links, credentials }
    }

    /// 用配置中的缺省凭据补全载荷
    pub fn from_payload(
        payload: SubmitPayload,
        defaults: &RequestDefaults,
    ) -> Result<Self, RequestError> {
        let openai_key = non_blank(payload.openai_key)
            .or_else(|| defaults.openai_key.clone())
            .ok_or(RequestError::MissingField { field: "openAIKey" })?;

        let browserless_token =
            non_blank(payload.browserless_token).or_else(|| defaults.browserless_token.clone());

        Ok(Self {
            links: payload.links,
            credentials: Credentials::new(openai_key, browserless_token),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// 任务生命周期阶段
///
/// 只能前进：pending → in_progress → {complete | error}。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Pending,
    InProgress,
    Complete,
    Error,
}

impl TaskPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskPhase::Complete | TaskPhase::Error)
    }

    pub fn can_advance_to(self, next: TaskPhase) -> bool {
        matches!(
            (self, next),
            (TaskPhase::Pending, TaskPhase::InProgress)
                | (TaskPhase::InProgress, TaskPhase::Complete)
                | (TaskPhase::InProgress, TaskPhase::Error)
        )
    }
}

/// 任务终态结果，写入后不可变
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Complete(Vec<Record>),
    Failed(String),
}

impl TaskOutcome {
    pub fn phase(&self) -> TaskPhase {
        match self {
            TaskOutcome::Complete(_) => TaskPhase::Complete,
            TaskOutcome::Failed(_) => TaskPhase::Error,
        }
    }

    pub fn into_status(self) -> TaskStatus {
        match self {
            TaskOutcome::Complete(results) => TaskStatus::Complete { results },
            TaskOutcome::Failed(error) => TaskStatus::Error { error },
        }
    }

    pub fn to_event(&self, task_id: TaskId) -> TaskEvent {
        match self {
            TaskOutcome::Complete(results) => TaskEvent::Complete {
                task_id,
                results: results.clone(),
            },
            TaskOutcome::Failed(error) => TaskEvent::ScrapeError {
                task_id,
                error: error.clone(),
            },
        }
    }
}

/// 轮询查询结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatus {
    InProgress,
    Complete { results: Vec<Record> },
    Error { error: String },
    NotFound,
}

/// 推送给订阅者的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TaskEvent {
    JoinSuccess { task_id: TaskId },
    Complete { task_id: TaskId, results: Vec<Record> },
    ScrapeError { task_id: TaskId, error: String },
    Error { error: String },
}
