use std::sync::Arc;

use domain::{Message, MessageContent, MessageId, NewMessage, ServerEvent, Username};

use crate::{
    broadcaster::{BroadcastHub, Scope},
    error::ApplicationError,
    repository::MessageRepository,
};

/// 历史消息单次查询上限
pub const MAX_HISTORY_LIMIT: u32 = 500;

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub username: String,
    pub content: String,
}

pub struct MessageServiceDependencies {
    pub message_repository: Arc<dyn MessageRepository>,
    pub hub: Arc<BroadcastHub>,
}

pub struct MessageService {
    deps: MessageServiceDependencies,
}

impl MessageService {
    pub fn new(deps: MessageServiceDependencies) -> Self {
        Self { deps }
    }

    /// 校验、持久化并广播一条消息
    ///
    /// 校验失败时不会调用持久化；持久化失败时不会广播，也不重试。
    pub async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<Message, ApplicationError> {
        let username = Username::parse(request.username)?;
        let content = MessageContent::new(request.content)?;

        let message = self
            .deps
            .message_repository
            .append(NewMessage::new(username, content))
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "failed to persist message");
                ApplicationError::from(err)
            })?;

        tracing::debug!(message_id = %message.id, username = %message.username, "message stored");
        self.deps
            .hub
            .publish(ServerEvent::NewMessage(message.clone()), Scope::All)
            .await;

        Ok(message)
    }

    /// 最近的消息，按时间升序
    pub async fn recent_messages(&self, limit: u32) -> Result<Vec<Message>, ApplicationError> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        Ok(self.deps.message_repository.list_recent(limit).await?)
    }

    pub async fn delete_message(&self, id: MessageId) -> Result<bool, ApplicationError> {
        let deleted = self.deps.message_repository.delete(id).await?;
        tracing::info!(message_id = %id, deleted, "message delete requested");
        Ok(deleted)
    }
}
