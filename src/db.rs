use sqlx::SqlitePool;

/// Schema for the parts of the system this crate owns. Lecture CRUD lives
/// elsewhere; the lectures table here only backs the extraction trigger's
/// lookup. Message timestamps are unix nanoseconds so stored order and sort
/// order agree exactly.
pub async fn migrate(db_pool: &SqlitePool) -> sqlx::Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            room_id TEXT NOT NULL,
            sender_id INTEGER NOT NULL,
            sender_email TEXT NOT NULL,
            sender_roles TEXT NOT NULL,
            text TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",
    )
    .execute(db_pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_messages_room_created
            ON messages (room_id, created_at, id)",
    )
    .execute(db_pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS lectures (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            speaker_id INTEGER NOT NULL
        )",
    )
    .execute(db_pool)
    .await?;

    Ok(())
}
