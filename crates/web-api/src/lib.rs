//! Web API 层。
//!
//! 提供 Axum 路由：REST 接口委托给消息服务，`/ws` 升级为连接会话。

mod error;
mod routes;
mod state;
mod ws_connection;

pub use error::{ApiError, ErrorBody};
pub use routes::router;
pub use state::AppState;
