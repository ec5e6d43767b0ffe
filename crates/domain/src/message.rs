use serde::{Deserialize, Serialize};

use crate::value_objects::{MessageContent, MessageId, Timestamp, Username};

/// 已持久化的聊天消息。
///
/// 只能由持久化端口在追加成功后创建，之后不可修改（只允许硬删除）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub username: Username,
    pub content: MessageContent,
    pub created_at: Timestamp,
}

impl Message {
    pub fn new(
        id: MessageId,
        username: Username,
        content: MessageContent,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            username,
            content,
            created_at,
        }
    }
}

/// 待追加的消息，尚未分配 ID 和时间戳。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub username: Username,
    pub content: MessageContent,
}

impl NewMessage {
    pub fn new(username: Username, content: MessageContent) -> Self {
        Self { username, content }
    }
}
