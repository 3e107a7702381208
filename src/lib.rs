pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod lectures;
pub mod users;

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;

pub use crate::error::{AppError, AppResult};
use crate::{chat::gateway::ChatGateway, extract::pipeline::QuestionExtractor};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub gateway: Arc<ChatGateway>,
    pub extractor: Arc<QuestionExtractor>,
}
