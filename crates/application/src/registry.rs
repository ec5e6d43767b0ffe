//! 会话注册表
//!
//! 记录连接到用户名的绑定，并按用户名维护引用计数，
//! 同一用户名可以同时通过多个连接在线（多设备）。

use std::collections::HashMap;

use domain::{ConnectionId, Username};
use tokio::sync::RwLock;

/// 一次解绑的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unbound {
    pub username: Username,
    /// 该用户名的最后一个连接已解绑，已从在线集合中移除
    pub went_offline: bool,
}

/// 一次绑定的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    /// 用户名此前不在线
    pub came_online: bool,
    /// 连接原先绑定了另一个用户名，已被替换
    pub replaced: Option<Unbound>,
}

#[derive(Debug)]
struct OnlineEntry {
    connections: usize,
    // 上线顺序，用于生成确定性的在线列表
    since: u64,
}

#[derive(Debug, Default)]
struct RegistryState {
    bindings: HashMap<ConnectionId, Username>,
    online: HashMap<Username, OnlineEntry>,
    next_seq: u64,
}

impl RegistryState {
    fn acquire(&mut self, username: &Username) -> bool {
        if let Some(entry) = self.online.get_mut(username) {
            entry.connections += 1;
            return false;
        }
        let since = self.next_seq;
        self.next_seq += 1;
        self.online.insert(
            username.clone(),
            OnlineEntry {
                connections: 1,
                since,
            },
        );
        true
    }

    fn release(&mut self, username: &Username) -> bool {
        match self.online.get_mut(username) {
            Some(entry) if entry.connections > 1 => {
                entry.connections -= 1;
                false
            }
            Some(_) => {
                self.online.remove(username);
                true
            }
            None => false,
        }
    }
}

#[derive(Default)]
pub struct SessionRegistry {
    state: RwLock<RegistryState>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 绑定连接到用户名。空用户名无法构造成 `Username`，因此不会进入注册表。
    /// 连接已有绑定时替换旧绑定，并重新计算旧用户名的在线状态。
    pub async fn bind(&self, connection_id: ConnectionId, username: Username) -> Bound {
        let mut state = self.state.write().await;

        if let Some(previous) = state.bindings.get(&connection_id) {
            if *previous == username {
                return Bound {
                    came_online: false,
                    replaced: None,
                };
            }
        }

        let replaced = state
            .bindings
            .insert(connection_id, username.clone())
            .map(|previous| {
                let went_offline = state.release(&previous);
                Unbound {
                    username: previous,
                    went_offline,
                }
            });
        let came_online = state.acquire(&username);

        tracing::debug!(%connection_id, %username, came_online, "session bound");
        Bound {
            came_online,
            replaced,
        }
    }

    /// 幂等：未绑定的连接返回 `None`
    pub async fn unbind(&self, connection_id: ConnectionId) -> Option<Unbound> {
        let mut state = self.state.write().await;
        let username = state.bindings.remove(&connection_id)?;
        let went_offline = state.release(&username);

        tracing::debug!(%connection_id, %username, went_offline, "session unbound");
        Some(Unbound {
            username,
            went_offline,
        })
    }

    pub async fn username_of(&self, connection_id: ConnectionId) -> Option<Username> {
        self.state.read().await.bindings.get(&connection_id).cloned()
    }

    pub async fn is_online(&self, username: &Username) -> bool {
        self.state.read().await.online.contains_key(username)
    }

    /// 当前在线用户名，按上线时间升序
    pub async fn online_usernames(&self) -> Vec<Username> {
        let state = self.state.read().await;
        let mut entries: Vec<_> = state.online.iter().collect();
        entries.sort_by_key(|(_, entry)| entry.since);
        entries
            .into_iter()
            .map(|(username, _)| username.clone())
            .collect()
    }

    pub async fn connection_count(&self) -> usize {
        self.state.read().await.bindings.len()
    }
}
