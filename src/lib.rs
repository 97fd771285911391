//! # Product Scrape
//!
//! 一个并发抓取商品名称和价格的 Rust 服务
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `browser/` - 远程 / 本地浏览器会话
//! - `infrastructure/` - `JsExecutor`，页面脚本执行能力
//!
//! ### ② 业务能力层（Services）
//! - `LanguageModel` / `LlmService` - 对话补全能力
//! - `BrowsingAgent` / `ChromeAgent` - 打开页面并按指令回答
//!
//! ### ③ 流程层（Workflow）
//! - `ExtractionCtx` - 单个链接的上下文（任务 ID + 序号）
//! - `ExtractionFlow` - 单个链接的完整流程（代理 → 解析 → 修复一次）
//!
//! ### ④ 编排层（Orchestration）
//! - `AdmissionGate` - 全局并发闸门
//! - `BatchScheduler` - 一个任务的全部链接并发处理、有序汇总
//!
//! ### ⑤ 任务层（Registry）
//! - `TaskRegistry` - 任务生命周期、轮询、订阅
//! - `NotificationHub` - 按任务分房间的终态推送
//!
//! ### ⑥ 接口层（API）
//! - `api/` - HTTP 提交 / 轮询 / 健康检查，WebSocket 订阅

pub mod api;
pub mod app;
pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod registry;
pub mod services;
pub mod utils;
pub mod workflow;

#[cfg(test)]
mod test_support;

// 重新导出常用类型
pub use api::{create_router, ApiState};
pub use app::App;
pub use config::Config;
pub use error::{AgentError, BrowserError, LlmError, RequestError, ScrapeError};
pub use infrastructure::JsExecutor;
pub use models::{
    Credentials, Price, Record, ScrapeRequest, SubmitPayload, TaskEvent, TaskId, TaskStatus,
};
pub use orchestrator::{AdmissionGate, BatchScheduler};
pub use registry::{MemberId, NotificationHub, Subscription, TaskRegistry};
pub use services::{AgentTask, BrowsingAgent, ChromeAgent, LanguageModel, LlmService};
pub use workflow::{ExtractionCtx, ExtractionFlow};
