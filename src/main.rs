use std::sync::Arc;

use axum::Router;
use lecturechat::{
    AppState,
    chat::{self, gateway::ChatGateway, registry::RoomRegistry, store::SqliteMessageStore},
    config::Config,
    db,
    extract::{
        self, openai::OpenAiSummarizer, paginator::TranscriptPaginator,
        pipeline::QuestionExtractor,
    },
};
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect(&config.database_url)
        .await?;
    db::migrate(&db_pool).await?;

    let store = Arc::new(SqliteMessageStore::new(db_pool.clone()));
    let gateway = Arc::new(ChatGateway::new(RoomRegistry::default(), store.clone()));
    let summarizer = Arc::new(OpenAiSummarizer::new(
        config.openai_api_key.clone(),
        config.openai_model.clone(),
    ));
    let extractor = Arc::new(QuestionExtractor::new(
        TranscriptPaginator::new(store),
        summarizer,
        config.extraction_timeout,
    ));

    let app = Router::new()
        .nest("/chat", chat::router())
        .nest("/lectures", extract::router())
        .with_state(AppState {
            db_pool,
            gateway,
            extractor,
        })
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
