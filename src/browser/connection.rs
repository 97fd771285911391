use chromiumoxide::Browser;
use futures::StreamExt;
use tracing::{debug, error, info};

use super::BrowserSession;
use crate::error::BrowserError;

/// 用会话令牌填充远程端点模板
pub fn remote_endpoint(template: &str, token: &str) -> String {
    template.replace("{token}", token)
}

/// 去掉查询串，避免令牌进入日志
fn redact(endpoint: &str) -> &str {
    endpoint.split('?').next().unwrap_or(endpoint)
}

/// 连接到远程浏览器
pub async fn connect_remote(endpoint: &str) -> Result<BrowserSession, BrowserError> {
    let shown = redact(endpoint);
    info!("正在连接到远程浏览器: {}", shown);

    let (browser, mut handler) = Browser::connect(endpoint).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        BrowserError::connection_failed(shown, e)
    })?;
    debug!("浏览器连接成功");

    // 在后台处理浏览器事件
    let handle = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    Ok(BrowserSession::new(browser, handle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_endpoint_substitutes_token() {
        let endpoint = remote_endpoint("wss://chrome.example.io?token={token}", "abc123");
        assert_eq!(endpoint, "wss://chrome.example.io?token=abc123");
    }

    #[test]
    fn test_redact_strips_query() {
        assert_eq!(
            redact("wss://chrome.example.io?token=abc123"),
            "wss://chrome.example.io"
        );
        assert_eq!(redact("ws://localhost:9222"), "ws://localhost:9222");
    }

    #[tokio::test]
    async fn test_connect_failure_hides_token() {
        // 先占用再释放端口，保证连接被拒绝
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let endpoint = remote_endpoint(&format!("ws://127.0.0.1:{port}?token={{token}}"), "secret-token");
        let err = match connect_remote(&endpoint).await {
            Ok(_) => panic!("关闭的端口不应连接成功"),
            Err(e) => e,
        };

        match &err {
            BrowserError::ConnectionFailed { endpoint, .. } => {
                assert_eq!(endpoint, &format!("ws://127.0.0.1:{port}"))
            }
            other => panic!("应为连接错误，实际为 {other:?}"),
        }
        assert!(!err.to_string().contains("secret-token"));
    }
}
