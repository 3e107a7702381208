use sqlx::SqlitePool;

use crate::error::{AppError, AppResult};

/// Read-only view of a lecture; CRUD is someone else's job. The chat room
/// for a lecture is keyed by its id rendered as a string.
#[derive(Debug, Clone)]
pub struct Lecture {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub speaker_id: i64,
}

impl Lecture {
    pub fn room_id(&self) -> String {
        self.id.to_string()
    }
}

pub async fn find(db_pool: &SqlitePool, lecture_id: i64) -> AppResult<Lecture> {
    let row: Option<(i64, String, Option<String>, i64)> =
        sqlx::query_as("SELECT id,title,description,speaker_id FROM lectures WHERE id=?")
            .bind(lecture_id)
            .fetch_optional(db_pool)
            .await?;

    let (id, title, description, speaker_id) =
        row.ok_or_else(|| AppError::not_found(format!("lecture {lecture_id}")))?;

    Ok(Lecture {
        id,
        title,
        description,
        speaker_id,
    })
}
