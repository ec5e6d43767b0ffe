use async_trait::async_trait;
use domain::{Message, MessageId, NewMessage, RepositoryError};

/// 消息持久化端口
///
/// 只追加；ID 和创建时间由实现方分配。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    // 追加一条消息，返回分配了 ID 和时间戳的消息
    async fn append(&self, message: NewMessage) -> Result<Message, RepositoryError>;

    // 最近的 limit 条消息，按时间升序（最旧的在前）
    async fn list_recent(&self, limit: u32) -> Result<Vec<Message>, RepositoryError>;

    // 硬删除，返回是否确实删除了记录
    async fn delete(&self, id: MessageId) -> Result<bool, RepositoryError>;
}

/// 内存实现的消息仓储（未配置数据库时使用，也用于测试）
pub mod memory {
    use std::sync::Arc;

    use super::*;
    use crate::clock::{Clock, SystemClock};
    use tokio::sync::Mutex;

    struct MemoryState {
        next_id: i64,
        messages: Vec<Message>,
    }

    pub struct InMemoryMessageRepository {
        state: Mutex<MemoryState>,
        clock: Arc<dyn Clock>,
    }

    impl Default for InMemoryMessageRepository {
        fn default() -> Self {
            Self::new(Arc::new(SystemClock))
        }
    }

    impl InMemoryMessageRepository {
        pub fn new(clock: Arc<dyn Clock>) -> Self {
            Self {
                state: Mutex::new(MemoryState {
                    next_id: 1,
                    messages: Vec::new(),
                }),
                clock,
            }
        }

        pub async fn len(&self) -> usize {
            self.state.lock().await.messages.len()
        }

        pub async fn is_empty(&self) -> bool {
            self.len().await == 0
        }
    }

    #[async_trait]
    impl MessageRepository for InMemoryMessageRepository {
        async fn append(&self, message: NewMessage) -> Result<Message, RepositoryError> {
            let mut state = self.state.lock().await;
            let id = MessageId(state.next_id);
            state.next_id += 1;

            let stored = Message::new(id, message.username, message.content, self.clock.now());
            state.messages.push(stored.clone());
            Ok(stored)
        }

        async fn list_recent(&self, limit: u32) -> Result<Vec<Message>, RepositoryError> {
            let state = self.state.lock().await;
            let skip = state.messages.len().saturating_sub(limit as usize);
            Ok(state.messages[skip..].to_vec())
        }

        async fn delete(&self, id: MessageId) -> Result<bool, RepositoryError> {
            let mut state = self.state.lock().await;
            let before = state.messages.len();
            state.messages.retain(|message| message.id != id);
            Ok(state.messages.len() != before)
        }
    }

}
