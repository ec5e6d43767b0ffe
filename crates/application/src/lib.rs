//! 应用层实现。
//!
//! 会话注册表、在线状态协调、广播中心和连接会话状态机，
//! 以及对持久化端口的抽象。全部状态都在进程内，由启动代码显式创建并共享。

pub mod broadcaster;
pub mod clock;
pub mod error;
pub mod presence;
pub mod registry;
pub mod repository;
pub mod services;
pub mod session;

pub use broadcaster::{BroadcastHub, Scope, Subscription, DEFAULT_OUTBOUND_CAPACITY};
pub use clock::{Clock, SystemClock};
pub use error::ApplicationError;
pub use presence::PresenceCoordinator;
pub use registry::{Bound, SessionRegistry, Unbound};
pub use repository::{memory::InMemoryMessageRepository, MessageRepository};
pub use services::{MessageService, MessageServiceDependencies, SendMessageRequest};
pub use session::{ConnectionSession, SessionContext, SessionState};
