//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量扇出和并发约束，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `admission` - 全局准入闸门
//! - 计数信号量，跨所有任务限制同时进行的提取数
//! - 记录当前并发数和峰值，便于观测
//!
//! ### `batch_processor` - 批量链接处理器
//! - 每个链接一个并发单元
//! - 按输入顺序汇总结果
//! - 任一硬失败即整批失败
//!
//! ## 层次关系
//!
//! ```text
//! registry (任务生命周期)
//!     ↓
//! batch_processor (处理 Vec<url>)
//!     ↓
//! workflow::ExtractionFlow (处理单个链接)
//!     ↓
//! services (能力层：browsing agent / llm)
//!     ↓
//! infrastructure (基础设施：JsExecutor)
//! ```

pub mod admission;
pub mod batch_processor;

// 重新导出主要类型
pub use admission::{AdmissionGate, AdmissionPermit};
pub use batch_processor::BatchScheduler;
