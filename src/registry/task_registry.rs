//! 任务注册表
//!
//! ## 职责
//!
//! 1. **创建**：为提交分配任务 ID，并在后台启动批量处理
//! 2. **状态迁移**：pending → in_progress → {complete | error}，只能前进
//! 3. **查询**：轮询读到终态后删除记录（只读一次）
//! 4. **推送**：终态迁移时通过 [`NotificationHub`] 推送给订阅者
//!
//! 所有操作在同一把锁内完成，迁移、查询和订阅互不丢失更新。
//! 锁顺序固定为 tasks → rooms。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::{ScrapeRequest, TaskEvent, TaskId, TaskOutcome, TaskPhase, TaskStatus};
use crate::orchestrator::BatchScheduler;
use crate::registry::notification_hub::{MemberId, NotificationHub};

struct TaskEntry {
    phase: TaskPhase,
    url_count: usize,
    submitted_at: Instant,
    finished_at: Option<Instant>,
    outcome: Option<TaskOutcome>,
}

impl TaskEntry {
    fn advance(&mut self, next: TaskPhase) -> bool {
        if self.phase.can_advance_to(next) {
            self.phase = next;
            true
        } else {
            false
        }
    }
}

/// 订阅结果
#[derive(Debug)]
pub enum Subscription {
    /// 任务已是终态且尚未被轮询取走，直接交付
    Ready(TaskEvent),
    /// 等待终态推送
    Pending(broadcast::Receiver<TaskEvent>),
    /// 该订阅者已在房间内
    AlreadyJoined,
}

struct RegistryInner {
    tasks: Mutex<HashMap<TaskId, TaskEntry>>,
    hub: NotificationHub,
    scheduler: Arc<BatchScheduler>,
    retention: Duration,
}

/// 任务注册表（可克隆，所有克隆共享状态）
#[derive(Clone)]
pub struct TaskRegistry {
    inner: Arc<RegistryInner>,
}

impl TaskRegistry {
    pub fn new(scheduler: BatchScheduler, config: &Config) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                tasks: Mutex::new(HashMap::new()),
                hub: NotificationHub::new(config.notify_channel_capacity),
                scheduler: Arc::new(scheduler),
                retention: Duration::from_secs(config.terminal_retention_secs),
            }),
        }
    }

    fn lock_tasks(&self) -> MutexGuard<'_, HashMap<TaskId, TaskEntry>> {
        self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 提交一个批次，立即返回任务 ID
    ///
    /// 必须在 tokio 运行时内调用。
    pub fn submit(&self, request: ScrapeRequest) -> TaskId {
        self.sweep_expired();

        let task_id = TaskId::generate();
        let url_count = request.links.len();
        {
            let mut tasks = self.lock_tasks();
            let mut entry = TaskEntry {
                phase: TaskPhase::Pending,
                url_count,
                submitted_at: Instant::now(),
                finished_at: None,
                outcome: None,
            };
            // 在启动后台单元之前进入 in_progress，终态迁移才有合法的起点
            entry.advance(TaskPhase::InProgress);
            tasks.insert(task_id, entry);
        }

        info!("📥 收到 {} 个链接，创建任务 {}", url_count, task_id);

        let registry = self.clone();
        tokio::spawn(async move {
            registry.run_task(task_id, request).await;
        });

        task_id
    }

    /// 后台单元：运行批次并写入终态
    async fn run_task(self, task_id: TaskId, request: ScrapeRequest) {
        let scheduler = self.inner.scheduler.clone();
        let ScrapeRequest { links, credentials } = request;

        // 批次在独立任务中运行，panic 也会转换为 error 终态
        let batch =
            tokio::spawn(async move { scheduler.run_batch(task_id, &links, &credentials).await });

        let outcome = match batch.await {
            Ok(Ok(records)) => TaskOutcome::Complete(records),
            Ok(Err(e)) => TaskOutcome::Failed(e.to_string()),
            Err(e) => TaskOutcome::Failed(format!("任务执行单元异常退出: {}", e)),
        };

        self.finish(task_id, outcome);
    }

    /// 终态迁移并推送
    fn finish(&self, task_id: TaskId, outcome: TaskOutcome) {
        let mut tasks = self.lock_tasks();
        let Some(entry) = tasks.get_mut(&task_id) else {
            warn!("任务 {} 已不在注册表中，丢弃结果", task_id);
            return;
        };

        if let TaskOutcome::Complete(results) = &outcome {
            if results.len() != entry.url_count {
                warn!(
                    "任务 {} 结果数量 {} 与链接数量 {} 不一致",
                    task_id,
                    results.len(),
                    entry.url_count
                );
            }
        }

        if !entry.advance(outcome.phase()) {
            warn!(
                "任务 {} 的状态迁移被拒绝: {:?} → {:?}",
                task_id,
                entry.phase,
                outcome.phase()
            );
            return;
        }

        entry.finished_at = Some(Instant::now());
        let elapsed = entry.submitted_at.elapsed();
        let event = outcome.to_event(task_id);
        entry.outcome = Some(outcome);

        let delivered = self.inner.hub.publish(task_id, event);
        info!(
            "🏁 任务 {} 进入终态 {:?}，耗时 {:.1}s，推送给 {} 个订阅者",
            task_id,
            entry.phase,
            elapsed.as_secs_f64(),
            delivered
        );
    }

    /// 查询任务状态
    ///
    /// 读到终态时删除记录，再次查询返回 `NotFound`。
    pub fn status_of(&self, task_id: &TaskId) -> TaskStatus {
        let mut tasks = self.lock_tasks();
        match tasks.get(task_id) {
            None => TaskStatus::NotFound,
            Some(entry) if !entry.phase.is_terminal() => TaskStatus::InProgress,
            Some(_) => {
                debug!("任务 {} 的终态已被读取，删除记录", task_id);
                tasks
                    .remove(task_id)
                    .and_then(|entry| entry.outcome)
                    .map(TaskOutcome::into_status)
                    .unwrap_or(TaskStatus::NotFound)
            }
        }
    }

    /// 查询任务阶段，不消费终态
    pub fn phase_of(&self, task_id: &TaskId) -> Option<TaskPhase> {
        self.lock_tasks().get(task_id).map(|entry| entry.phase)
    }

    /// 订阅任务终态
    ///
    /// 与终态迁移在同一把锁内：要么看到已存的终态，要么一定收到推送。
    pub fn subscribe(&self, task_id: TaskId, member: MemberId) -> Subscription {
        let tasks = self.lock_tasks();
        if let Some(outcome) = tasks.get(&task_id).and_then(|entry| entry.outcome.as_ref()) {
            return Subscription::Ready(outcome.to_event(task_id));
        }

        match self.inner.hub.join(task_id, member) {
            Some(rx) => Subscription::Pending(rx),
            None => Subscription::AlreadyJoined,
        }
    }

    /// 取消订阅
    pub fn unsubscribe(&self, task_id: TaskId, member: MemberId) {
        self.inner.hub.leave(task_id, member);
    }

    /// 未进入终态的任务数量
    pub fn active_tasks(&self) -> usize {
        self.lock_tasks()
            .values()
            .filter(|entry| !entry.phase.is_terminal())
            .count()
    }

    pub fn scheduler(&self) -> &BatchScheduler {
        &self.inner.scheduler
    }

    /// 清理超过保留期仍无人读取的终态记录
    fn sweep_expired(&self) {
        let retention = self.inner.retention;
        let removed = {
            let mut tasks = self.lock_tasks();
            let before = tasks.len();
            tasks.retain(|_, entry| match entry.finished_at {
                Some(finished) => finished.elapsed() < retention,
                None => true,
            });
            before - tasks.len()
        };
        if removed > 0 {
            info!("🧹 清理了 {} 个过期的终态任务", removed);
        }
        self.inner.hub.cleanup();
    }
}
