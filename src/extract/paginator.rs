use std::sync::Arc;

use crate::chat::store::{ChatMessage, MessageStore, Order};

pub const DEFAULT_BATCH_SIZE: u32 = 100;

/// Lazy, restartable walk over a room's transcript, oldest message first.
/// Pages are a pure function of store state: as long as nothing is written
/// to the room, page N always yields the same messages, so a caller can
/// re-request any page after a transient failure.
pub struct TranscriptPaginator {
    store: Arc<dyn MessageStore>,
}

impl TranscriptPaginator {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Page numbers start at 1. An empty page means the transcript is
    /// exhausted and the caller must stop.
    pub async fn next(
        &self,
        room_id: &str,
        page: u32,
        batch_size: u32,
    ) -> anyhow::Result<Vec<ChatMessage>> {
        anyhow::ensure!(page >= 1, "transcript pages start at 1");
        let skip = (page as u64 - 1) * batch_size as u64;
        self.store
            .find_page(room_id, Order::OldestFirst, skip, batch_size)
            .await
    }
}
