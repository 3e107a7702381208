pub mod gateway;
pub mod protocol;
pub mod registry;
pub mod store;
mod ws;

use axum::{Router, routing::get};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws::chat_ws))
}
