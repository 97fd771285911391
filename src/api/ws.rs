//! WebSocket 订阅
//!
//! 客户端帧：`{"event":"join_task","task_id":"..."}` / `{"event":"leave_task","task_id":"..."}`
//!
//! 服务端帧：`join_success`、`complete`、`scrape_error`、`error`。
//! 每个连接一个 [`MemberId`]，同一连接重复加入同一任务不会重复投递。

use std::collections::HashMap;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::ApiState;
use crate::models::{TaskEvent, TaskId};
use crate::registry::{MemberId, Subscription, TaskRegistry};

/// 客户端发来的帧
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ClientFrame {
    JoinTask { task_id: String },
    LeaveTask { task_id: String },
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.registry))
}

async fn handle_socket(socket: WebSocket, registry: TaskRegistry) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<TaskEvent>();

    // 所有出站帧走同一个通道，保证 join_success 先于终态事件
    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!("事件序列化失败: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut session = WsSession::new(registry, tx);
    info!("🔌 WebSocket 连接建立 ({:?})", session.member);

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => session.handle_text(&text),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("WebSocket 读取失败: {}", e);
                break;
            }
        }
    }

    session.close();
    writer.abort();
    info!("🔌 WebSocket 连接断开");
}

/// 单个连接的订阅状态
struct WsSession {
    member: MemberId,
    registry: TaskRegistry,
    outbound: mpsc::UnboundedSender<TaskEvent>,
    joined: HashMap<TaskId, Option<JoinHandle<()>>>,
}

impl WsSession {
    fn new(registry: TaskRegistry, outbound: mpsc::UnboundedSender<TaskEvent>) -> Self {
        Self {
            member: MemberId::generate(),
            registry,
            outbound,
            joined: HashMap::new(),
        }
    }

    fn send(&self, event: TaskEvent) {
        // 写端已关闭说明连接正在断开
        let _ = self.outbound.send(event);
    }

    fn send_error(&self, error: impl Into<String>) {
        self.send(TaskEvent::Error {
            error: error.into(),
        });
    }

    fn handle_text(&mut self, text: &str) {
        let frame = match serde_json::from_str::<ClientFrame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                self.send_error(format!("无法识别的消息: {}", e));
                return;
            }
        };

        let (raw_id, joining) = match &frame {
            ClientFrame::JoinTask { task_id } => (task_id, true),
            ClientFrame::LeaveTask { task_id } => (task_id, false),
        };
        let Ok(task_id) = raw_id.parse::<TaskId>() else {
            self.send_error(format!("无效的任务 ID: {}", raw_id));
            return;
        };

        if joining {
            self.join(task_id);
        } else {
            self.leave(task_id);
        }
    }

    fn join(&mut self, task_id: TaskId) {
        self.send(TaskEvent::JoinSuccess { task_id });
        if self.joined.contains_key(&task_id) {
            return;
        }

        let forwarder = match self.registry.subscribe(task_id, self.member) {
            Subscription::Ready(event) => {
                self.send(event);
                None
            }
            Subscription::Pending(rx) => Some(spawn_forwarder(task_id, rx, self.outbound.clone())),
            Subscription::AlreadyJoined => None,
        };
        debug!("连接 {:?} 加入任务 {}", self.member, task_id);
        self.joined.insert(task_id, forwarder);
    }

    fn leave(&mut self, task_id: TaskId) {
        if let Some(forwarder) = self.joined.remove(&task_id) {
            if let Some(handle) = forwarder {
                handle.abort();
            }
            self.registry.unsubscribe(task_id, self.member);
            debug!("连接 {:?} 离开任务 {}", self.member, task_id);
        }
    }

    fn close(&mut self) {
        let task_ids: Vec<TaskId> = self.joined.keys().copied().collect();
        for task_id in task_ids {
            self.leave(task_id);
        }
    }
}

/// 等待房间推送的唯一一条终态事件并转发到连接
fn spawn_forwarder(
    task_id: TaskId,
    mut rx: broadcast::Receiver<TaskEvent>,
    outbound: mpsc::UnboundedSender<TaskEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match rx.recv().await {
            Ok(event) => {
                let _ = outbound.send(event);
            }
            Err(e) => debug!("任务 {} 的推送通道关闭: {}", task_id, e),
        }
    })
}
