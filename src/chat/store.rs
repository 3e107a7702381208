//! Durable message persistence boundary. The gateway and the transcript
//! paginator only ever talk to the `MessageStore` trait so tests can swap
//! the sqlite implementation for an in-memory fake.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::SafeUser;

/// One persisted chat message. Immutable once written; the sender profile is
/// a snapshot taken at send time, not a live reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub id: Uuid,
    #[serde(rename = "roomId")]
    pub room_id: String,
    pub user: SafeUser,
    pub text: String,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    NewestFirst,
    OldestFirst,
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persists a message, assigning id and timestamp, and returns it as
    /// stored.
    async fn insert(
        &self,
        room_id: &str,
        sender: &SafeUser,
        text: &str,
    ) -> anyhow::Result<ChatMessage>;

    /// One bounded slice of a room's transcript. Deterministic for a fixed
    /// store state: same arguments, same messages. Skip is u64 because it is
    /// a page*limit product of client-supplied numbers.
    async fn find_page(
        &self,
        room_id: &str,
        order: Order,
        skip: u64,
        limit: u32,
    ) -> anyhow::Result<Vec<ChatMessage>>;
}

#[derive(Clone)]
pub struct SqliteMessageStore {
    db_pool: SqlitePool,
}

impl SqliteMessageStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }
}

type MessageRow = (String, String, i64, String, String, String, i64);

fn row_to_message(
    (id, room_id, sender_id, sender_email, sender_roles, text, created_at): MessageRow,
) -> anyhow::Result<ChatMessage> {
    Ok(ChatMessage {
        id: Uuid::parse_str(&id)?,
        room_id,
        user: SafeUser {
            id: sender_id,
            email: sender_email,
            roles: serde_json::from_str(&sender_roles)?,
        },
        text,
        created_at: OffsetDateTime::from_unix_timestamp_nanos(created_at as i128)?,
    })
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn insert(
        &self,
        room_id: &str,
        sender: &SafeUser,
        text: &str,
    ) -> anyhow::Result<ChatMessage> {
        let id = Uuid::now_v7();
        let created_at = OffsetDateTime::now_utc();

        sqlx::query(
            "INSERT INTO messages (id,room_id,sender_id,sender_email,sender_roles,text,created_at)
                VALUES (?,?,?,?,?,?,?)",
        )
        .bind(id.to_string())
        .bind(room_id)
        .bind(sender.id)
        .bind(&sender.email)
        .bind(serde_json::to_string(&sender.roles)?)
        .bind(text)
        .bind(created_at.unix_timestamp_nanos() as i64)
        .execute(&self.db_pool)
        .await?;

        Ok(ChatMessage {
            id,
            room_id: room_id.to_owned(),
            user: sender.clone(),
            text: text.to_owned(),
            created_at,
        })
    }

    async fn find_page(
        &self,
        room_id: &str,
        order: Order,
        skip: u64,
        limit: u32,
    ) -> anyhow::Result<Vec<ChatMessage>> {
        let query = match order {
            Order::NewestFirst => {
                "SELECT id,room_id,sender_id,sender_email,sender_roles,text,created_at
                    FROM messages WHERE room_id=?
                    ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
            }
            Order::OldestFirst => {
                "SELECT id,room_id,sender_id,sender_email,sender_roles,text,created_at
                    FROM messages WHERE room_id=?
                    ORDER BY created_at ASC, id ASC LIMIT ? OFFSET ?"
            }
        };

        // A skip past i64 territory is past any conceivable transcript;
        // saturating keeps the result an empty page instead of wrapping.
        let rows: Vec<MessageRow> = sqlx::query_as(query)
            .bind(room_id)
            .bind(limit as i64)
            .bind(i64::try_from(skip).unwrap_or(i64::MAX))
            .fetch_all(&self.db_pool)
            .await?;

        rows.into_iter().map(row_to_message).collect()
    }
}
