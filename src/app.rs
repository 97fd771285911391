use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::api::{create_router, ApiState};
use crate::config::Config;
use crate::orchestrator::{AdmissionGate, BatchScheduler};
use crate::registry::TaskRegistry;
use crate::services::{BrowsingAgent, ChromeAgent, LanguageModel, LlmService};
use crate::utils::logging::log_startup;
use crate::workflow::ExtractionFlow;

/// 应用主结构
pub struct App {
    config: Config,
    registry: TaskRegistry,
}

impl App {
    /// 初始化应用：真实浏览器代理 + OpenAI 兼容模型
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let llm: Arc<dyn LanguageModel> = Arc::new(LlmService::new(&config));
        let agent: Arc<dyn BrowsingAgent> = Arc::new(ChromeAgent::new(&config, llm.clone()));

        if config.default_browserless_token.is_none() && !config.allow_local_browser {
            warn!("⚠️ 未配置默认浏览器令牌且禁用本地浏览器，请求必须自带 browserless_token");
        }

        Ok(Self::from_parts(config, agent, llm))
    }

    /// 用给定的代理和模型组装应用
    pub fn from_parts(
        config: Config,
        agent: Arc<dyn BrowsingAgent>,
        llm: Arc<dyn LanguageModel>,
    ) -> Self {
        let flow = ExtractionFlow::new(agent, llm, &config);
        let gate = AdmissionGate::new(config.max_concurrent_extractions);
        let scheduler = BatchScheduler::new(gate, flow);
        let registry = TaskRegistry::new(scheduler, &config);

        Self { config, registry }
    }

    /// 构建 HTTP 路由
    pub fn router(&self) -> Router {
        create_router(ApiState::from_config(self.registry.clone(), &self.config))
    }

    /// 在指定监听器上提供服务，直到收到 Ctrl+C
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        info!("🌐 服务已启动: http://{}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP 服务异常退出")?;

        info!("👋 服务已停止");
        Ok(())
    }

    /// 绑定配置中的地址并运行
    pub async fn run(self) -> Result<()> {
        let addr: SocketAddr = self
            .config
            .bind_addr
            .parse()
            .with_context(|| format!("无效的监听地址: {}", self.config.bind_addr))?;

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("无法绑定地址: {}", addr))?;

        self.serve(listener).await
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("无法监听 Ctrl+C 信号: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 收到停止信号，正在关闭...");
}
