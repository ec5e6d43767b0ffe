//! 连接会话
//!
//! 每个传输连接对应一个 `ConnectionSession`，负责：
//! - 用户名绑定的状态机（Connecting -> Joined -> Disconnected，Joined 可主动 Left）
//! - 入站事件的校验与分发
//! - 错误只回报给当前连接
//!
//! 会话本身不接触传输层，Web 层负责把帧喂给 `handle_frame`，
//! 并把 `Subscription` 中的事件写回客户端。

use std::sync::Arc;

use domain::{ClientEvent, ConnectionId, ServerEvent, Username};

use crate::{
    broadcaster::{BroadcastHub, Scope, Subscription},
    error::ApplicationError,
    presence::PresenceCoordinator,
    registry::SessionRegistry,
    repository::MessageRepository,
    services::{MessageService, MessageServiceDependencies, SendMessageRequest},
};

/// 所有会话共享的组件，由服务启动时显式创建
#[derive(Clone)]
pub struct SessionContext {
    pub registry: Arc<SessionRegistry>,
    pub hub: Arc<BroadcastHub>,
    pub presence: Arc<PresenceCoordinator>,
    pub messages: Arc<MessageService>,
}

impl SessionContext {
    /// 以给定的持久化端口组装全部共享组件
    pub fn build(message_repository: Arc<dyn MessageRepository>, outbound_capacity: usize) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let hub = Arc::new(BroadcastHub::new(outbound_capacity));
        let presence = Arc::new(PresenceCoordinator::new(registry.clone(), hub.clone()));
        let messages = Arc::new(MessageService::new(MessageServiceDependencies {
            message_repository,
            hub: hub.clone(),
        }));

        Self {
            registry,
            hub,
            presence,
            messages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// 已接受连接，尚未绑定用户名
    Connecting,
    Joined(Username),
    /// 主动离开后连接仍然打开，可以再次加入
    Left,
    /// 终态
    Disconnected,
}

pub struct ConnectionSession {
    id: ConnectionId,
    ctx: SessionContext,
    state: SessionState,
}

impl ConnectionSession {
    /// 接受一个新连接：分配 ID 并订阅广播中心
    pub async fn open(ctx: SessionContext) -> (Self, Subscription) {
        let id = ConnectionId::new();
        let subscription = ctx.hub.subscribe(id).await;
        tracing::info!(connection_id = %id, "connection accepted");
        (
            Self {
                id,
                ctx,
                state: SessionState::Connecting,
            },
            subscription,
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn username(&self) -> Option<&Username> {
        match &self.state {
            SessionState::Joined(username) => Some(username),
            _ => None,
        }
    }

    /// 解析并处理一个文本帧，无法解析的帧按协议错误回报
    pub async fn handle_frame(&mut self, text: &str) {
        match ClientEvent::parse(text) {
            Ok(event) => self.handle(event).await,
            Err(err) => {
                tracing::debug!(connection_id = %self.id, error = %err, "malformed frame");
                self.report(ApplicationError::protocol(err.to_string())).await;
            }
        }
    }

    /// 处理一个入站事件，失败时向当前连接发送 `error`
    pub async fn handle(&mut self, event: ClientEvent) {
        if self.state == SessionState::Disconnected {
            tracing::debug!(connection_id = %self.id, event = event.name(), "event after disconnect ignored");
            return;
        }

        tracing::debug!(connection_id = %self.id, event = event.name(), "inbound event");
        if let Err(err) = self.dispatch(event).await {
            self.report(err).await;
        }
    }

    async fn dispatch(&mut self, event: ClientEvent) -> Result<(), ApplicationError> {
        match event {
            ClientEvent::Join { username } => self.join(username).await,
            ClientEvent::Leave => self.leave().await,
            ClientEvent::SendMessage { username, content } => {
                self.require_joined("send_message")?;
                self.ctx
                    .messages
                    .send_message(SendMessageRequest { username, content })
                    .await?;
                Ok(())
            }
            ClientEvent::TypingStart => {
                let username = self.require_joined("typing_start")?.clone();
                self.ctx
                    .hub
                    .publish(ServerEvent::UserTyping(username), Scope::AllExcept(self.id))
                    .await;
                Ok(())
            }
            ClientEvent::TypingStop => {
                let username = self.require_joined("typing_stop")?.clone();
                self.ctx
                    .hub
                    .publish(
                        ServerEvent::UserStopTyping(username),
                        Scope::AllExcept(self.id),
                    )
                    .await;
                Ok(())
            }
        }
    }

    async fn join(&mut self, raw: String) -> Result<(), ApplicationError> {
        let username = Username::parse(raw)?;
        let bound = self.ctx.registry.bind(self.id, username.clone()).await;

        // 同一连接换了用户名：先为旧用户名发离开通知
        if let Some(replaced) = &bound.replaced {
            self.ctx.presence.notify_left(replaced).await;
        }
        self.state = SessionState::Joined(username.clone());
        tracing::info!(connection_id = %self.id, %username, "session joined");
        self.ctx.presence.notify_joined(&username).await;
        Ok(())
    }

    async fn leave(&mut self) -> Result<(), ApplicationError> {
        self.require_joined("leave")?;
        self.state = SessionState::Left;
        if let Some(unbound) = self.ctx.registry.unbind(self.id).await {
            self.ctx.presence.notify_left(&unbound).await;
        }
        Ok(())
    }

    /// 传输关闭时调用（任何原因）。重复调用不产生任何效果。
    pub async fn disconnect(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }
        self.state = SessionState::Disconnected;

        self.ctx.hub.unsubscribe(self.id).await;
        if let Some(unbound) = self.ctx.registry.unbind(self.id).await {
            self.ctx.presence.notify_left(&unbound).await;
        }
        tracing::info!(connection_id = %self.id, "connection closed");
    }

    fn require_joined(&self, event: &str) -> Result<&Username, ApplicationError> {
        self.username()
            .ok_or_else(|| ApplicationError::protocol(format!("must join before {event}")))
    }

    async fn report(&self, err: ApplicationError) {
        tracing::warn!(connection_id = %self.id, error = %err, "event rejected");
        self.ctx
            .hub
            .publish(ServerEvent::error(err.client_reason()), Scope::Only(self.id))
            .await;
    }
}
