use std::sync::Arc;

use domain::{ServerEvent, Username};
use tokio::sync::Mutex;

use crate::broadcaster::{BroadcastHub, Scope};
use crate::registry::{SessionRegistry, Unbound};

/// 在线状态协调器
///
/// 注册表变更之后由连接会话调用，向所有连接广播完整的在线列表和加入/离开通知。
/// 广播尽力而为，不持久化、不重试；错过的客户端会在下一次变更或重新加入时追上。
pub struct PresenceCoordinator {
    registry: Arc<SessionRegistry>,
    hub: Arc<BroadcastHub>,
    // 快照与发布在同一把锁内完成，较旧的 users_update 不会晚于较新的送达
    emit_lock: Mutex<()>,
}

impl PresenceCoordinator {
    pub fn new(registry: Arc<SessionRegistry>, hub: Arc<BroadcastHub>) -> Self {
        Self {
            registry,
            hub,
            emit_lock: Mutex::new(()),
        }
    }

    /// 用户名绑定成功后调用。重复绑定已在线的用户名同样会广播。
    pub async fn notify_joined(&self, username: &Username) {
        let _guard = self.emit_lock.lock().await;
        let online = self.registry.online_usernames().await;

        tracing::info!(%username, online = online.len(), "user joined");
        self.hub
            .publish(ServerEvent::UsersUpdate(online), Scope::All)
            .await;
        self.hub
            .publish(
                ServerEvent::UserJoined {
                    username: username.clone(),
                },
                Scope::All,
            )
            .await;
    }

    /// 解绑之后调用。总是广播在线列表；只有当该用户名的最后一个连接离开时才发送 user_left。
    pub async fn notify_left(&self, unbound: &Unbound) {
        let _guard = self.emit_lock.lock().await;
        let online = self.registry.online_usernames().await;

        tracing::info!(
            username = %unbound.username,
            went_offline = unbound.went_offline,
            online = online.len(),
            "user left"
        );
        self.hub
            .publish(ServerEvent::UsersUpdate(online), Scope::All)
            .await;
        if unbound.went_offline {
            self.hub
                .publish(
                    ServerEvent::UserLeft {
                        username: unbound.username.clone(),
                    },
                    Scope::All,
                )
                .await;
        }
    }
}
