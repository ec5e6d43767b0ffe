use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

/// 统一的时间戳类型。
pub type Timestamp = DateTime<Utc>;

pub const USERNAME_MIN_CHARS: usize = 2;
pub const USERNAME_MAX_CHARS: usize = 50;
pub const MESSAGE_MAX_CHARS: usize = 500;

/// 传输连接标识，在接受连接时分配，只在连接存活期间有效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ConnectionId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// 消息唯一标识，由持久化层分配，单调递增。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MessageId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<MessageId> for i64 {
    fn from(value: MessageId) -> Self {
        value.0
    }
}

/// 经过验证的用户名。
///
/// 反序列化同样经过 `parse` 校验。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// 去除首尾空白后校验长度，按字符计数。
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_owned();
        let len = value.chars().count();
        if len == 0 {
            return Err(DomainError::invalid_argument("username", "cannot be empty"));
        }
        if len < USERNAME_MIN_CHARS {
            return Err(DomainError::invalid_argument("username", "too short"));
        }
        if len > USERNAME_MAX_CHARS {
            return Err(DomainError::invalid_argument("username", "too long"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Username {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 经过验证的消息内容。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageContent(String);

impl MessageContent {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_owned();
        if value.is_empty() {
            return Err(DomainError::invalid_argument("content", "cannot be empty"));
        }
        if value.chars().count() > MESSAGE_MAX_CHARS {
            return Err(DomainError::invalid_argument(
                "content",
                format!("exceeds {MESSAGE_MAX_CHARS} characters"),
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for MessageContent {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MessageContent> for String {
    fn from(value: MessageContent) -> Self {
        value.0
    }
}

impl fmt::Display for MessageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_is_trimmed() {
        let name = Username::parse("  alice ").unwrap();
        assert_eq!(name.as_str(), "alice");
    }

    #[test]
    fn username_length_bounds() {
        assert!(Username::parse("   ").is_err());
        assert!(Username::parse("a").is_err());
        assert!(Username::parse("ab").is_ok());
        assert!(Username::parse("x".repeat(50)).is_ok());
        assert!(Username::parse("x".repeat(51)).is_err());
    }

    #[test]
    fn content_length_bounds() {
        assert!(MessageContent::new(" \n\t ").is_err());
        assert!(MessageContent::new("h").is_ok());
        assert!(MessageContent::new("x".repeat(500)).is_ok());

        let err = MessageContent::new("x".repeat(501)).unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidArgument { field: "content", .. }
        ));
    }

    #[test]
    fn content_counts_characters_not_bytes() {
        // 每个字符 3 字节，500 个字符仍然合法
        assert!(MessageContent::new("你".repeat(500)).is_ok());
        assert!(MessageContent::new("你".repeat(501)).is_err());
    }

    #[test]
    fn deserialization_applies_the_same_validation() {
        let name: Username = serde_json::from_str(r#""  alice ""#).unwrap();
        assert_eq!(name.as_str(), "alice");
        assert!(serde_json::from_str::<Username>(r#""a""#).is_err());

        let too_long = serde_json::to_string(&"x".repeat(900)).unwrap();
        assert!(serde_json::from_str::<MessageContent>(&too_long).is_err());
        assert!(serde_json::from_str::<MessageContent>(r#""   ""#).is_err());

        // 序列化仍然是裸字符串
        assert_eq!(serde_json::to_string(&name).unwrap(), r#""alice""#);
    }

    #[test]
    fn connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }
}
