//! 聊天中继核心领域模型
//!
//! 包含用户名、消息等值对象，以及客户端/服务器之间的事件定义。

pub mod errors;
pub mod events;
pub mod message;
pub mod value_objects;

// 重新导出常用类型
pub use errors::*;
pub use events::{ClientEvent, ServerEvent};
pub use message::{Message, NewMessage};
pub use value_objects::*;
