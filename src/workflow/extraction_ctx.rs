//! 提取上下文
//!
//! 封装"我正在处理哪个任务的第几个链接"这一信息

use std::fmt::Display;

use crate::models::TaskId;

/// 提取上下文
///
/// 包含处理单个链接所需的定位信息，主要用于日志前缀
#[derive(Debug, Clone)]
pub struct ExtractionCtx {
    /// 任务ID
    pub task_id: TaskId,

    /// 链接在输入中的位置（从1开始）
    pub url_index: usize,

    /// 本批链接总数
    pub total: usize,

    /// 目标链接
    pub url: String,
}

impl ExtractionCtx {
    /// 创建新的提取上下文
    pub fn new(task_id: TaskId, url_index: usize, total: usize, url: impl Into<String>) -> Self {
        Self {
            task_id,
            url_index,
            total,
            url: url.into(),
        }
    }
}

impl Display for ExtractionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let task_id = self.task_id.to_string();
        write!(
            f,
            "[任务 {} 链接#{}/{}]",
            &task_id[..8.min(task_id.len())],
            self.url_index,
            self.total
        )
    }
}
