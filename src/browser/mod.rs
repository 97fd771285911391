//! 浏览器会话
//!
//! 有令牌时连接远程浏览器（browserless 风格的 CDP 端点），
//! 否则按配置启动本地无头浏览器。

pub mod connection;
pub mod headless;

use chromiumoxide::{Browser, Page};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::Config;
use crate::error::BrowserError;

pub use connection::{connect_remote, remote_endpoint};
pub use headless::launch_headless;

/// 浏览器会话配置
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub ws_template: String,
    pub allow_local_browser: bool,
    pub chrome_executable: Option<String>,
}

impl BrowserSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ws_template: config.browser_ws_template.clone(),
            allow_local_browser: config.allow_local_browser,
            chrome_executable: config.chrome_executable.clone(),
        }
    }
}

/// 一个浏览器连接及其事件处理任务
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    pub(crate) fn new(browser: Browser, handler: JoinHandle<()>) -> Self {
        Self { browser, handler }
    }

    /// 打开新页面并等待导航完成
    pub async fn open_page(&self, url: &str) -> Result<Page, BrowserError> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| BrowserError::navigation_failed(url, e))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| BrowserError::navigation_failed(url, e))?;
        debug!("页面导航成功: {}", url);
        Ok(page)
    }

    /// 关闭浏览器并停止事件处理
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            debug!("关闭浏览器时出错（忽略）: {}", e);
        }
        self.handler.abort();
    }
}

/// 根据令牌选择远程或本地浏览器
pub async fn open_session(
    settings: &BrowserSettings,
    token: Option<&str>,
) -> Result<BrowserSession, BrowserError> {
    match token {
        Some(token) => connect_remote(&remote_endpoint(&settings.ws_template, token)).await,
        None if settings.allow_local_browser => {
            launch_headless(settings.chrome_executable.as_deref()).await
        }
        None => Err(BrowserError::ConfigurationFailed {
            reason: "未提供 browserless_token，且未允许本地浏览器".to_string(),
        }),
    }
}
