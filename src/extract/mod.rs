pub mod document;
pub mod openai;
pub mod paginator;
pub mod pipeline;

use std::sync::Arc;

use axum::{
    Router, debug_handler,
    extract::{Path, State},
    response::Response,
    routing::get,
};
use sqlx::SqlitePool;
use tracing::info;

use crate::{
    AppState,
    error::{AppError, AppResult},
    lectures,
    users::CurrentUser,
};

use self::pipeline::QuestionExtractor;

pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/questions", get(lecture_questions))
}

/// Extraction trigger: only the lecture's assigned speaker may run it.
/// Authorization is snapshotted here, before any paging happens, and not
/// re-checked mid-run.
#[debug_handler(state = crate::AppState)]
async fn lecture_questions(
    State(db_pool): State<SqlitePool>,
    State(extractor): State<Arc<QuestionExtractor>>,
    Path(lecture_id): Path<i64>,
    CurrentUser(user_id): CurrentUser,
) -> AppResult<Response> {
    let lecture = lectures::find(&db_pool, lecture_id).await?;
    if lecture.speaker_id != user_id {
        return Err(AppError::forbidden(
            "only the lecture's speaker may generate questions",
        ));
    }

    info!(lecture = lecture.id, speaker = user_id, "starting question extraction");
    let questions = extractor.run(&lecture).await?;

    Ok(document::render(
        &lecture.title,
        lecture.description.as_deref(),
        &questions,
    ))
}
