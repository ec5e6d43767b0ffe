use domain::{DomainError, RepositoryError};
use thiserror::Error;

/// 会话层错误。
///
/// 三类错误都只回报给触发它的连接，不会影响其他连接或共享状态。
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 用户名或消息内容校验失败
    #[error("validation error: {0}")]
    Validation(#[from] DomainError),
    /// 持久化追加失败，消息被丢弃，不重试
    #[error("persistence error: {0}")]
    Persistence(#[from] RepositoryError),
    /// 当前状态下不接受该事件，例如加入前发送消息
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ApplicationError {
    pub fn protocol(message: impl Into<String>) -> Self {
        ApplicationError::Protocol(message.into())
    }

    /// 下发给客户端的错误原因，不暴露存储细节
    pub fn client_reason(&self) -> String {
        match self {
            ApplicationError::Validation(err) => err.to_string(),
            ApplicationError::Persistence(_) => "failed to save message".to_string(),
            ApplicationError::Protocol(reason) => reason.clone(),
        }
    }
}
