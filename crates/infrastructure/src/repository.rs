use application::MessageRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Message, MessageContent, MessageId, NewMessage, RepositoryError, Username};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    RepositoryError::storage(err.to_string())
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: i64,
    username: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let username =
            Username::parse(value.username).map_err(|err| invalid_data(err.to_string()))?;
        let content =
            MessageContent::new(value.content).map_err(|err| invalid_data(err.to_string()))?;

        Ok(Message::new(
            MessageId::from(value.id),
            username,
            content,
            value.created_at,
        ))
    }
}

/// 追加后数据库分配的字段
#[derive(Debug, FromRow)]
struct InsertedRecord {
    id: i64,
    created_at: DateTime<Utc>,
}

impl InsertedRecord {
    /// 内容在入库前已经校验，直接与分配的 ID、时间戳组合，不再回读校验
    fn into_message(self, message: NewMessage) -> Message {
        Message::new(
            MessageId::from(self.id),
            message.username,
            message.content,
            self.created_at,
        )
    }
}

/// PostgreSQL 消息仓储，ID 由 BIGSERIAL 分配
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn append(&self, message: NewMessage) -> Result<Message, RepositoryError> {
        let record = sqlx::query_as::<_, InsertedRecord>(
            r#"
            INSERT INTO messages (username, content)
            VALUES ($1, $2)
            RETURNING id, created_at
            "#,
        )
        .bind(message.username.as_str())
        .bind(message.content.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.into_message(message))
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<Message>, RepositoryError> {
        // 先取最新的 limit 条，再按 ID 升序返回
        let records = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT id, username, content, created_at FROM (
                SELECT id, username, content, created_at
                FROM messages
                ORDER BY id DESC
                LIMIT $1
            ) recent
            ORDER BY id ASC
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Message::try_from).collect()
    }

    async fn delete(&self, id: MessageId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(i64::from(id))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        Ok(result.rows_affected() > 0)
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
