/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;
use crate::models::TaskId;

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 并发商品信息抓取服务");
    info!("📊 全局最大并发提取数: {}", config.max_concurrent_extractions);
    info!("🤖 模型: {} ({})", config.llm_model_name, config.llm_api_base_url);
    info!(
        "🕐 启动时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
}

/// 记录批次开始信息
///
/// # 参数
/// - `task_id`: 任务 ID
/// - `total`: 链接总数
pub fn log_batch_start(task_id: &TaskId, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 任务 {} 开始处理", task_id);
    info!("📄 本批链接: 共 {} 个", total);
    info!("{}", "=".repeat(60));
}

/// 记录批次完成信息
///
/// # 参数
/// - `task_id`: 任务 ID
/// - `filled`: 非空记录数量
/// - `total`: 链接总数
/// - `elapsed`: 耗时
pub fn log_batch_complete(task_id: &TaskId, filled: usize, total: usize, elapsed: Duration) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 任务 {} 完成: 有效记录 {}/{}，耗时 {:.1}s",
        task_id,
        filled,
        total,
        elapsed.as_secs_f64()
    );
    info!("{}", "─".repeat(60));
}

/// 记录批次失败信息
pub fn log_batch_failed(task_id: &TaskId, error: &str, elapsed: Duration) {
    warn!("\n{}", "─".repeat(60));
    warn!(
        "❌ 任务 {} 失败 (耗时 {:.1}s): {}",
        task_id,
        elapsed.as_secs_f64(),
        error
    );
    warn!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("价格是一千二百九十九", 4), "价格是一...");
    }
}
