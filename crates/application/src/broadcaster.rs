//! 广播中心
//!
//! 所有下行事件的唯一出口。每个连接订阅时获得一个有界队列，
//! 发布按订阅者逐个入队，因此同一订阅者看到的事件顺序与发布顺序一致。

use std::collections::HashMap;
use std::sync::Arc;

use domain::{ConnectionId, ServerEvent};
use tokio::sync::{mpsc, Mutex};

/// 每个连接出站队列的默认容量
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// 广播范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// 所有连接，包括发送者
    All,
    /// 除指定连接外的所有连接
    AllExcept(ConnectionId),
    /// 只发给指定连接（错误回报）
    Only(ConnectionId),
}

impl Scope {
    fn includes(&self, connection_id: ConnectionId) -> bool {
        match *self {
            Scope::All => true,
            Scope::AllExcept(excluded) => excluded != connection_id,
            Scope::Only(target) => target == connection_id,
        }
    }
}

/// 单个连接的下行事件流
pub struct Subscription {
    connection_id: ConnectionId,
    receiver: mpsc::Receiver<Arc<ServerEvent>>,
}

impl Subscription {
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// 等待下一条事件。返回 `None` 表示该连接已被广播中心移除
    /// （主动取消订阅或者队列溢出），此时连接应当关闭。
    pub async fn recv(&mut self) -> Option<Arc<ServerEvent>> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<ServerEvent>> {
        self.receiver.try_recv().ok()
    }
}

pub struct BroadcastHub {
    subscribers: Mutex<HashMap<ConnectionId, mpsc::Sender<Arc<ServerEvent>>>>,
    capacity: usize,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_OUTBOUND_CAPACITY)
    }
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// 为连接创建出站队列。重复订阅会替换旧队列，旧的事件流随之结束。
    pub async fn subscribe(&self, connection_id: ConnectionId) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let mut subscribers = self.subscribers.lock().await;
        if subscribers.insert(connection_id, sender).is_some() {
            tracing::debug!(%connection_id, "replaced existing subscription");
        }
        Subscription {
            connection_id,
            receiver,
        }
    }

    /// 幂等：未订阅的连接直接忽略
    pub async fn unsubscribe(&self, connection_id: ConnectionId) -> bool {
        self.subscribers
            .lock()
            .await
            .remove(&connection_id)
            .is_some()
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    /// 把事件放入范围内每个订阅者的队列，返回成功入队的数量。
    ///
    /// 发布过程持有订阅表的锁，不等待任何 I/O。已关闭的订阅者静默移除；
    /// 队列已满的订阅者同样被移除，其连接会因事件流结束而断开。
    pub async fn publish(&self, event: ServerEvent, scope: Scope) -> usize {
        let event = Arc::new(event);
        let mut subscribers = self.subscribers.lock().await;
        let mut delivered = 0;
        let mut dropped = Vec::new();

        for (&connection_id, sender) in subscribers.iter() {
            if !scope.includes(connection_id) {
                continue;
            }
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        %connection_id,
                        capacity = self.capacity,
                        "outbound queue full, dropping slow connection"
                    );
                    dropped.push(connection_id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(%connection_id, "subscriber already gone");
                    dropped.push(connection_id);
                }
            }
        }

        for connection_id in dropped {
            subscribers.remove(&connection_id);
        }

        tracing::debug!(event = event.name(), ?scope, delivered, "event published");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Username;

    fn name(value: &str) -> Username {
        Username::parse(value).unwrap()
    }

    fn drain(subscription: &mut Subscription) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Some(event) = subscription.try_recv() {
            events.push((*event).clone());
        }
        events
    }

    #[tokio::test]
    async fn preserves_publish_order_per_subscriber() {
        let hub = BroadcastHub::default();
        let first = ConnectionId::new();
        let second = ConnectionId::new();
        let mut sub_a = hub.subscribe(first).await;
        let mut sub_b = hub.subscribe(second).await;

        let sequence = vec![
            ServerEvent::UsersUpdate(vec![name("alice")]),
            ServerEvent::UserJoined {
                username: name("alice"),
            },
            ServerEvent::UserTyping(name("alice")),
            ServerEvent::error("boom"),
            ServerEvent::UserLeft {
                username: name("alice"),
            },
        ];
        for event in &sequence {
            hub.publish(event.clone(), Scope::All).await;
        }

        assert_eq!(drain(&mut sub_a), sequence);
        assert_eq!(drain(&mut sub_b), sequence);
    }

    #[tokio::test]
    async fn scopes_select_recipients() {
        let hub = BroadcastHub::default();
        let sender = ConnectionId::new();
        let other = ConnectionId::new();
        let mut sub_sender = hub.subscribe(sender).await;
        let mut sub_other = hub.subscribe(other).await;

        let delivered = hub
            .publish(ServerEvent::UserTyping(name("bob")), Scope::AllExcept(sender))
            .await;
        assert_eq!(delivered, 1);

        let delivered = hub
            .publish(ServerEvent::error("only you"), Scope::Only(sender))
            .await;
        assert_eq!(delivered, 1);

        assert_eq!(drain(&mut sub_sender), vec![ServerEvent::error("only you")]);
        assert_eq!(
            drain(&mut sub_other),
            vec![ServerEvent::UserTyping(name("bob"))]
        );
    }

    #[tokio::test]
    async fn closed_subscribers_are_dropped_silently() {
        let hub = BroadcastHub::default();
        let gone = ConnectionId::new();
        let alive = ConnectionId::new();
        drop(hub.subscribe(gone).await);
        let mut sub_alive = hub.subscribe(alive).await;

        let delivered = hub.publish(ServerEvent::error("x"), Scope::All).await;
        assert_eq!(delivered, 1);
        assert_eq!(hub.subscriber_count().await, 1);
        assert_eq!(drain(&mut sub_alive).len(), 1);
    }

    #[tokio::test]
    async fn overflowing_subscriber_is_disconnected() {
        let hub = BroadcastHub::new(2);
        let slow = ConnectionId::new();
        let fast = ConnectionId::new();
        let mut sub_slow = hub.subscribe(slow).await;
        let mut sub_fast = hub.subscribe(fast).await;

        for i in 0..3 {
            hub.publish(ServerEvent::error(format!("e{i}")), Scope::All).await;
            // fast 消费者及时读取
            assert!(sub_fast.try_recv().is_some());
        }

        assert_eq!(hub.subscriber_count().await, 1);
        // 已入队的事件仍可读完，然后事件流结束
        assert!(sub_slow.recv().await.is_some());
        assert!(sub_slow.recv().await.is_some());
        assert!(sub_slow.recv().await.is_none());
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent_and_ends_stream() {
        let hub = BroadcastHub::default();
        let id = ConnectionId::new();
        let mut sub = hub.subscribe(id).await;

        assert!(hub.unsubscribe(id).await);
        assert!(!hub.unsubscribe(id).await);
        assert!(sub.recv().await.is_none());
        assert_eq!(hub.publish(ServerEvent::error("late"), Scope::All).await, 0);
    }
}
