//! HTTP / WebSocket 接口
//!
//! - `POST /scrape_info`：提交一批链接，立即返回任务 ID
//! - `GET /scrape_status/:task_id`：轮询状态（终态只能读取一次）
//! - `GET /ws`：WebSocket 订阅，加入任务房间后等待终态推送
//! - `GET /health`：健康检查

pub mod http;
pub mod ws;

use axum::http::Method;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::models::RequestDefaults;
use crate::registry::TaskRegistry;

/// 路由共享状态
#[derive(Clone)]
pub struct ApiState {
    pub registry: TaskRegistry,
    pub defaults: RequestDefaults,
}

impl ApiState {
    pub fn new(registry: TaskRegistry, defaults: RequestDefaults) -> Self {
        Self { registry, defaults }
    }

    pub fn from_config(registry: TaskRegistry, config: &Config) -> Self {
        Self::new(
            registry,
            RequestDefaults {
                openai_key: config.default_openai_key.clone(),
                browserless_token: config.default_browserless_token.clone(),
            },
        )
    }
}

/// 创建路由
pub fn create_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/health", get(http::health))
        .route("/scrape_info", post(http::submit_scrape))
        .route("/scrape_status/:task_id", get(http::scrape_status))
        .route("/ws", get(ws::ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
