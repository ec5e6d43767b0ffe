//! WebSocket 事件定义
//!
//! 客户端与服务器之间的 JSON 帧格式为 `{"event": "<name>", "data": <payload>}`。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DomainError;
use crate::message::Message;
use crate::value_objects::Username;

/// 客户端事件
///
/// 载荷中的字符串尚未校验，校验在会话层完成。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// 绑定用户名
    Join { username: String },
    /// 主动离开，连接可以保持
    Leave,
    /// 发送消息
    SendMessage { username: String, content: String },
    TypingStart,
    TypingStop,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct JoinPayload {
    username: String,
}

#[derive(Debug, Deserialize)]
struct SendMessagePayload {
    username: String,
    content: String,
}

impl ClientEvent {
    /// 解析一个文本帧
    ///
    /// `join` 同时接受 `{"username": ".."}` 和裸字符串两种载荷。
    /// `leave`、`typing_*` 的载荷会被忽略，打字状态始终使用连接绑定的用户名。
    pub fn parse(text: &str) -> Result<Self, DomainError> {
        let frame: RawFrame = serde_json::from_str(text)
            .map_err(|err| DomainError::malformed_frame(err.to_string()))?;

        match frame.event.as_str() {
            "join" => {
                let username = match frame.data {
                    Value::String(username) => username,
                    data => {
                        serde_json::from_value::<JoinPayload>(data)
                            .map_err(|err| DomainError::malformed_frame(err.to_string()))?
                            .username
                    }
                };
                Ok(Self::Join { username })
            }
            "leave" => Ok(Self::Leave),
            "send_message" => {
                let payload: SendMessagePayload = serde_json::from_value(frame.data)
                    .map_err(|err| DomainError::malformed_frame(err.to_string()))?;
                Ok(Self::SendMessage {
                    username: payload.username,
                    content: payload.content,
                })
            }
            "typing_start" => Ok(Self::TypingStart),
            "typing_stop" => Ok(Self::TypingStop),
            other => Err(DomainError::malformed_frame(format!(
                "unknown event `{other}`"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Leave => "leave",
            Self::SendMessage { .. } => "send_message",
            Self::TypingStart => "typing_start",
            Self::TypingStop => "typing_stop",
        }
    }
}

/// 服务器推送给客户端的事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    NewMessage(Message),
    /// 当前在线用户名，按上线时间升序
    UsersUpdate(Vec<Username>),
    UserJoined { username: Username },
    UserLeft { username: Username },
    UserTyping(Username),
    UserStopTyping(Username),
    /// 只发给触发错误的连接
    Error { reason: String },
}

impl ServerEvent {
    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error {
            reason: reason.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NewMessage(_) => "new_message",
            Self::UsersUpdate(_) => "users_update",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
            Self::UserTyping(_) => "user_typing",
            Self::UserStopTyping(_) => "user_stop_typing",
            Self::Error { .. } => "error",
        }
    }
}
