//! 任务通知房间
//!
//! 每个任务 ID 一个房间（broadcast channel）。订阅者加入房间，
//! 任务进入终态时推送一次完整载荷，随后房间被拆除。
//! 推送是尽力而为：发布时不在线的订阅者收不到。

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::models::{TaskEvent, TaskId};

/// 订阅者标识（每个连接一个）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberId(Uuid);

impl MemberId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

struct Room {
    tx: broadcast::Sender<TaskEvent>,
    members: HashSet<MemberId>,
}

/// 按任务 ID 分房间的推送中心
pub struct NotificationHub {
    rooms: Mutex<HashMap<TaskId, Room>>,
    capacity: usize,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, Room>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 加入房间；已在房间内时返回 `None`（不会重复投递）
    pub fn join(&self, task_id: TaskId, member: MemberId) -> Option<broadcast::Receiver<TaskEvent>> {
        let mut rooms = self.lock();
        let room = rooms.entry(task_id).or_insert_with(|| Room {
            tx: broadcast::channel(self.capacity).0,
            members: HashSet::new(),
        });

        if !room.members.insert(member) {
            return None;
        }
        debug!("订阅者加入任务 {} 的房间 (成员 {})", task_id, room.members.len());
        Some(room.tx.subscribe())
    }

    /// 离开房间，房间空了就移除
    pub fn leave(&self, task_id: TaskId, member: MemberId) {
        let mut rooms = self.lock();
        if let Some(room) = rooms.get_mut(&task_id) {
            room.members.remove(&member);
            if room.members.is_empty() {
                rooms.remove(&task_id);
            }
        }
    }

    /// 向房间推送事件并拆除房间
    ///
    /// # 返回
    /// 收到事件的订阅者数量
    pub fn publish(&self, task_id: TaskId, event: TaskEvent) -> usize {
        let Some(room) = self.lock().remove(&task_id) else {
            return 0;
        };
        // 没有接收者时 send 返回错误，忽略
        room.tx.send(event).unwrap_or(0)
    }

    /// 移除没有接收者的房间
    pub fn cleanup(&self) {
        self.lock().retain(|_, room| room.tx.receiver_count() > 0);
    }

    pub fn room_count(&self) -> usize {
        self.lock().len()
    }
}
