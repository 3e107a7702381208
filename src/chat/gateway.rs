use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    chat::{
        protocol::ServerEvent,
        registry::{Member, RoomRegistry},
        store::{MessageStore, Order},
    },
    error::{AppError, AppResult},
    users::SafeUser,
};

/// One gateway instance serves every connection. Per-event entry points are
/// dispatched from the websocket loop; failures are returned to the caller
/// and never leak to other connections.
pub struct ChatGateway {
    registry: RoomRegistry,
    store: Arc<dyn MessageStore>,
}

impl ChatGateway {
    pub fn new(registry: RoomRegistry, store: Arc<dyn MessageStore>) -> Self {
        Self { registry, store }
    }

    /// Binds a fresh connection to the room named in its handshake. The
    /// profile is snapshotted here; later sends use this binding, not
    /// whatever the client claims per message.
    pub fn connect(
        &self,
        conn_id: Uuid,
        room_id: &str,
        user: SafeUser,
        tx: mpsc::UnboundedSender<ServerEvent>,
    ) {
        debug!(%conn_id, room_id, user_id = user.id, "connection joined");
        self.registry.join(conn_id, room_id, Member { user, tx });
    }

    pub fn disconnect(&self, conn_id: Uuid) {
        if let Some(room_id) = self.registry.leave(conn_id) {
            debug!(%conn_id, %room_id, "connection left");
        }
    }

    /// Persists the message, then fans it out to every current member of the
    /// room, sender included. The room's send gate is held across both steps
    /// so broadcast order matches persistence order; if the store fails,
    /// nobody hears anything and only the sender sees the error.
    pub async fn send_message(&self, conn_id: Uuid, room_id: &str, text: &str) -> AppResult<()> {
        if text.trim().is_empty() {
            return Err(AppError::validation("message text must not be empty"));
        }
        let (bound_room, member) = self.bound(conn_id, room_id)?;
        let gate = self
            .registry
            .send_gate(&bound_room)
            .ok_or_else(|| AppError::validation("connection is not joined to a room"))?;

        let _serialized = gate.lock().await;
        let persisted = self.store.insert(&bound_room, &member.user, text).await?;

        let members = self.registry.members(&bound_room);
        debug!(room_id = %bound_room, members = members.len(), "broadcasting message");
        for peer in members {
            // Best-effort: a peer mid-disconnect just misses the event.
            let _ = peer.tx.send(ServerEvent::ReceiveMessage {
                text: persisted.text.clone(),
                user: persisted.user.clone(),
                timestamp: persisted.created_at,
            });
        }
        Ok(())
    }

    /// Newest-first read of stored messages, unicast back to the requester.
    pub async fn fetch_history(
        &self,
        conn_id: Uuid,
        room_id: &str,
        page: u32,
        limit: u32,
    ) -> AppResult<()> {
        if page == 0 || limit == 0 {
            return Err(AppError::validation("page and limit must be at least 1"));
        }
        let Some((_, member)) = self.registry.binding(conn_id) else {
            return Err(AppError::validation("connection is not joined to a room"));
        };

        // Widen before multiplying; page and limit are client-supplied.
        let skip = (page as u64 - 1) * limit as u64;
        let messages = self
            .store
            .find_page(room_id, Order::NewestFirst, skip, limit)
            .await?;
        let _ = member.tx.send(ServerEvent::LoadMessages { messages });
        Ok(())
    }

    /// Typing state is transient: not persisted, not deduplicated, forwarded
    /// to all current members as-is.
    pub fn user_typing(&self, conn_id: Uuid, room_id: &str, user_id: i64) -> AppResult<()> {
        self.broadcast_transient(conn_id, room_id, ServerEvent::UserTyping { user_id })
    }

    pub fn user_stopped_typing(
        &self,
        conn_id: Uuid,
        room_id: &str,
        user_id: i64,
    ) -> AppResult<()> {
        self.broadcast_transient(conn_id, room_id, ServerEvent::UserStoppedTyping { user_id })
    }

    fn broadcast_transient(
        &self,
        conn_id: Uuid,
        room_id: &str,
        event: ServerEvent,
    ) -> AppResult<()> {
        let (bound_room, _) = self.bound(conn_id, room_id)?;
        for peer in self.registry.members(&bound_room) {
            if peer.tx.send(event.clone()).is_err() {
                warn!(room_id = %bound_room, "dropping event for closed connection");
            }
        }
        Ok(())
    }

    fn bound(&self, conn_id: Uuid, room_id: &str) -> AppResult<(String, Member)> {
        let Some((bound_room, member)) = self.registry.binding(conn_id) else {
            return Err(AppError::validation("connection is not joined to a room"));
        };
        if bound_room != room_id {
            return Err(AppError::validation(format!(
                "roomId {room_id} does not match the joined room"
            )));
        }
        Ok((bound_room, member))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering as AtomicOrdering;

    use super::*;
    use crate::{chat::store::fakes::MemStore, users::Role};

    fn user(id: i64) -> SafeUser {
        SafeUser {
            id,
            email: format!("u{id}@example.com"),
            roles: vec![Role::User],
        }
    }

    struct Peer {
        conn_id: Uuid,
        rx: mpsc::UnboundedReceiver<ServerEvent>,
    }

    fn join(gateway: &ChatGateway, room_id: &str, user_id: i64) -> Peer {
        let conn_id = Uuid::now_v7();
        let (tx, rx) = mpsc::unbounded_channel();
        gateway.connect(conn_id, room_id, user(user_id), tx);
        Peer { conn_id, rx }
    }

    fn setup() -> (ChatGateway, Arc<MemStore>) {
        let store = Arc::new(MemStore::default());
        (
            ChatGateway::new(RoomRegistry::default(), store.clone()),
            store,
        )
    }

    #[tokio::test]
    async fn send_persists_once_and_broadcasts_to_every_member() {
        let (gateway, store) = setup();
        let mut u1 = join(&gateway, "L42", 1);
        let mut u2 = join(&gateway, "L42", 2);

        gateway.send_message(u1.conn_id, "L42", "hello").await.unwrap();

        let stored = store.stored();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].room_id, "L42");
        assert_eq!(stored[0].text, "hello");
        assert_eq!(stored[0].user, user(1));

        for peer in [&mut u1, &mut u2] {
            match peer.rx.try_recv().unwrap() {
                ServerEvent::ReceiveMessage { text, user: sender, timestamp } => {
                    assert_eq!(text, "hello");
                    assert_eq!(sender, user(1));
                    assert_eq!(timestamp, stored[0].created_at);
                }
                other => panic!("expected receiveMessage, got {other:?}"),
            }
        }
        assert!(u1.rx.try_recv().is_err());
        assert!(u2.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_order_matches_persistence_order() {
        let (gateway, store) = setup();
        let u1 = join(&gateway, "L42", 1);
        let mut u2 = join(&gateway, "L42", 2);

        gateway.send_message(u1.conn_id, "L42", "first").await.unwrap();
        gateway.send_message(u2.conn_id, "L42", "second").await.unwrap();

        let stored = store.stored();
        assert!(stored[0].created_at < stored[1].created_at);

        let texts: Vec<String> = std::iter::from_fn(|| u2.rx.try_recv().ok())
            .map(|ev| match ev {
                ServerEvent::ReceiveMessage { text, .. } => text,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(texts, ["first", "second"]);
    }

    #[tokio::test]
    async fn empty_text_is_rejected_without_side_effects() {
        let (gateway, store) = setup();
        let mut u1 = join(&gateway, "L42", 1);

        let err = gateway.send_message(u1.conn_id, "L42", "   ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.stored().is_empty());
        assert!(u1.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_from_unjoined_connection_is_an_invalid_state() {
        let (gateway, store) = setup();

        let err = gateway
            .send_message(Uuid::now_v7(), "L42", "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.stored().is_empty());
    }

    #[tokio::test]
    async fn send_to_a_room_other_than_the_joined_one_is_rejected() {
        let (gateway, store) = setup();
        let u1 = join(&gateway, "L42", 1);

        let err = gateway.send_message(u1.conn_id, "L99", "hello").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.stored().is_empty());
    }

    #[tokio::test]
    async fn store_failure_reaches_only_the_sender() {
        let (gateway, store) = setup();
        let mut u1 = join(&gateway, "L42", 1);
        let mut u2 = join(&gateway, "L42", 2);
        store.fail_inserts.store(true, AtomicOrdering::SeqCst);

        let err = gateway.send_message(u1.conn_id, "L42", "hello").await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
        assert!(store.stored().is_empty());
        assert!(u1.rx.try_recv().is_err());
        assert!(u2.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnected_members_no_longer_receive_broadcasts() {
        let (gateway, store) = setup();
        let mut u1 = join(&gateway, "L42", 1);
        let u2 = join(&gateway, "L42", 2);

        gateway.disconnect(u2.conn_id);
        gateway.send_message(u1.conn_id, "L42", "hello").await.unwrap();

        assert_eq!(store.stored().len(), 1);
        assert!(matches!(
            u1.rx.try_recv().unwrap(),
            ServerEvent::ReceiveMessage { .. }
        ));
    }

    #[tokio::test]
    async fn fetch_history_replies_newest_first_to_the_requester_only() {
        let (gateway, store) = setup();
        store.seed("L42", &user(9), &["a", "b", "c"]);
        let mut u1 = join(&gateway, "L42", 1);
        let mut u2 = join(&gateway, "L42", 2);

        gateway.fetch_history(u1.conn_id, "L42", 1, 2).await.unwrap();

        match u1.rx.try_recv().unwrap() {
            ServerEvent::LoadMessages { messages } => {
                let texts: Vec<_> = messages.iter().map(|m| m.text.as_str()).collect();
                assert_eq!(texts, ["c", "b"]);
            }
            other => panic!("expected loadMessages, got {other:?}"),
        }
        assert!(u2.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn fetch_history_second_page_continues_descending() {
        let (gateway, store) = setup();
        store.seed("L42", &user(9), &["a", "b", "c", "d", "e"]);
        let mut u1 = join(&gateway, "L42", 1);

        gateway.fetch_history(u1.conn_id, "L42", 2, 2).await.unwrap();

        match u1.rx.try_recv().unwrap() {
            ServerEvent::LoadMessages { messages } => {
                let texts: Vec<_> = messages.iter().map(|m| m.text.as_str()).collect();
                assert_eq!(texts, ["c", "b"]);
            }
            other => panic!("expected loadMessages, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_history_far_past_the_transcript_is_an_empty_page() {
        let (gateway, store) = setup();
        store.seed("L42", &user(9), &["a", "b"]);
        let mut u1 = join(&gateway, "L42", 1);

        // page*limit overflows u32; must come back empty, not panic or wrap.
        gateway
            .fetch_history(u1.conn_id, "L42", u32::MAX, u32::MAX)
            .await
            .unwrap();

        match u1.rx.try_recv().unwrap() {
            ServerEvent::LoadMessages { messages } => assert!(messages.is_empty()),
            other => panic!("expected loadMessages, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn typing_events_are_broadcast_and_never_persisted() {
        let (gateway, store) = setup();
        let mut u1 = join(&gateway, "L42", 1);
        let mut u2 = join(&gateway, "L42", 2);

        gateway.user_typing(u1.conn_id, "L42", 1).unwrap();
        gateway.user_typing(u1.conn_id, "L42", 1).unwrap();
        gateway.user_stopped_typing(u1.conn_id, "L42", 1).unwrap();

        // No dedup: both members see all three events in order.
        for peer in [&mut u1, &mut u2] {
            assert!(matches!(
                peer.rx.try_recv().unwrap(),
                ServerEvent::UserTyping { user_id: 1 }
            ));
            assert!(matches!(
                peer.rx.try_recv().unwrap(),
                ServerEvent::UserTyping { user_id: 1 }
            ));
            assert!(matches!(
                peer.rx.try_recv().unwrap(),
                ServerEvent::UserStoppedTyping { user_id: 1 }
            ));
        }
        assert!(store.stored().is_empty());
    }
}
