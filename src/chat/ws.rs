use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::{
    chat::{
        gateway::ChatGateway,
        protocol::{ClientEvent, ServerEvent},
    },
    error::{AppError, AppResult},
    users::SafeUser,
};

/// Handshake parameters: the lecture room to join and the connecting user's
/// public profile (a json blob), both fixed for the lifetime of the
/// connection.
#[derive(Deserialize)]
pub(crate) struct ConnectQuery {
    lecture_id: String,
    user: String,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn chat_ws(
    State(gateway): State<Arc<ChatGateway>>,
    Query(ConnectQuery { lecture_id, user }): Query<ConnectQuery>,

    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let user: SafeUser = serde_json::from_str(&user)
        .map_err(|err| AppError::validation(format!("malformed user profile: {err}")))?;

    Ok(ws.on_upgrade(async move |socket| {
        handle_socket(gateway, lecture_id, user, socket).await;
    }))
}

async fn handle_socket(
    gateway: Arc<ChatGateway>,
    lecture_id: String,
    user: SafeUser,
    socket: WebSocket,
) {
    let conn_id = Uuid::now_v7();
    let (tx, mut rx) = mpsc::unbounded_channel();
    gateway.connect(conn_id, &lecture_id, user, tx.clone());

    let (mut sender, mut receiver) = socket.split();

    let outbound = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(json) = serde_json::to_string(&event) else {
                continue;
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        let data = match msg {
            Message::Text(_) | Message::Binary(_) => msg.into_data(),
            Message::Close(_) => break,
            // Pings and pongs are the transport's business.
            _ => continue,
        };
        let event: ClientEvent = match serde_json::from_slice(&data) {
            Ok(event) => event,
            Err(err) => {
                let _ = tx.send(ServerEvent::Error {
                    message: format!("invalid request: unrecognized event: {err}"),
                });
                continue;
            }
        };

        if let Err(err) = dispatch(&gateway, conn_id, event).await {
            // Failures stay with the connection that caused them.
            let _ = tx.send(ServerEvent::Error {
                message: err.to_string(),
            });
        }
    }

    debug!(%conn_id, "socket closed");
    gateway.disconnect(conn_id);
    outbound.abort();
}

async fn dispatch(gateway: &ChatGateway, conn_id: Uuid, event: ClientEvent) -> AppResult<()> {
    match event {
        ClientEvent::SendMessage { room_id, text } => {
            gateway.send_message(conn_id, &room_id, &text).await
        }
        ClientEvent::FetchMessages { room_id, page, limit } => {
            gateway.fetch_history(conn_id, &room_id, page, limit).await
        }
        ClientEvent::UserTyping { room_id, user_id } => {
            gateway.user_typing(conn_id, &room_id, user_id)
        }
        ClientEvent::UserStoppedTyping { room_id, user_id } => {
            gateway.user_stopped_typing(conn_id, &room_id, user_id)
        }
    }
}
