//! 批量链接处理器 - 编排层
//!
//! ## 职责
//!
//! 给定一个任务的全部链接，为每个链接启动一个提取流程，
//! 在全局准入闸门的约束下并发执行，并按输入顺序汇总结果。
//!
//! ## 核心规则
//!
//! 1. **并发控制**：所有任务共享同一个 [`AdmissionGate`]
//! 2. **无序扇出**：每个链接一个 `tokio::spawn`，互不等待
//! 3. **有序汇总**：结果顺序与输入顺序一致，与完成先后无关
//! 4. **整批失败**：任一链接硬失败，整批以该错误结束，不返回部分结果
//!
//! 失败后其余已启动的提取不会被取消，它们照常运行并归还许可。

use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use tracing::error;

use crate::error::ScrapeError;
use crate::models::{Credentials, Record, TaskId};
use crate::orchestrator::admission::AdmissionGate;
use crate::utils::logging::{log_batch_complete, log_batch_failed, log_batch_start};
use crate::workflow::{ExtractionCtx, ExtractionFlow};

/// 批量调度器
pub struct BatchScheduler {
    gate: AdmissionGate,
    flow: Arc<ExtractionFlow>,
}

impl BatchScheduler {
    pub fn new(gate: AdmissionGate, flow: ExtractionFlow) -> Self {
        Self {
            gate,
            flow: Arc::new(flow),
        }
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// 处理一个任务的全部链接
    ///
    /// # 返回
    /// 成功时返回与 `urls` 等长、同序的记录列表；
    /// 任一链接硬失败时返回最先出现的那个错误
    pub async fn run_batch(
        &self,
        task_id: TaskId,
        urls: &[String],
        credentials: &Credentials,
    ) -> Result<Vec<Record>, ScrapeError> {
        let started = Instant::now();
        let total = urls.len();
        log_batch_start(&task_id, total);

        let mut handles = Vec::with_capacity(total);

        // 为每个链接创建并发任务
        for (idx, url) in urls.iter().enumerate() {
            let ctx = ExtractionCtx::new(task_id, idx + 1, total, url.clone());
            let gate = self.gate.clone();
            let flow = self.flow.clone();
            let credentials = credentials.clone();

            let handle = tokio::spawn(async move {
                let _permit = gate.admit().await?;
                flow.run(&ctx, &credentials).await
            });
            handles.push((url.clone(), handle));
        }

        // 按输入顺序等待；任一失败立即返回
        let joined = handles.into_iter().map(|(url, handle)| async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!("[任务 {}] 链接 {} 的工作单元异常退出: {}", task_id, url, e);
                    Err(ScrapeError::WorkerAborted {
                        url,
                        reason: e.to_string(),
                    })
                }
            }
        });

        match try_join_all(joined).await {
            Ok(records) => {
                let filled = records.iter().filter(|r| !r.is_empty()).count();
                log_batch_complete(&task_id, filled, total, started.elapsed());
                Ok(records)
            }
            Err(e) => {
                log_batch_failed(&task_id, &e.to_string(), started.elapsed());
                Err(e)
            }
        }
    }
}
