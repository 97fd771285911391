pub mod notification_hub;
pub mod task_registry;

pub use notification_hub::{MemberId, NotificationHub};
pub use task_registry::{Subscription, TaskRegistry};
