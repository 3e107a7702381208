use std::{sync::Arc, time::Duration};

use tracing::{debug, info};

use crate::{
    chat::store::ChatMessage,
    error::{AppError, AppResult},
    extract::{
        openai::Summarizer,
        paginator::{DEFAULT_BATCH_SIZE, TranscriptPaginator},
    },
    lectures::Lecture,
};

/// Walks a lecture's transcript page by page, hands each non-empty page to
/// the summarizer and stitches the fragments together in page order. One
/// call in flight at a time; an empty page ends the run.
///
/// All-or-nothing: a store or summarizer failure (or blowing the time
/// budget) aborts the whole run with no partial output, since the result
/// feeds a single user-facing document.
pub struct QuestionExtractor {
    paginator: TranscriptPaginator,
    summarizer: Arc<dyn Summarizer>,
    timeout: Duration,
}

fn format_slice(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.user.email, m.text))
        .collect::<Vec<_>>()
        .join("\n")
}

impl QuestionExtractor {
    pub fn new(
        paginator: TranscriptPaginator,
        summarizer: Arc<dyn Summarizer>,
        timeout: Duration,
    ) -> Self {
        Self {
            paginator,
            summarizer,
            timeout,
        }
    }

    pub async fn run(&self, lecture: &Lecture) -> AppResult<String> {
        tokio::time::timeout(self.timeout, self.drive(lecture))
            .await
            .map_err(|_| {
                AppError::Upstream(anyhow::anyhow!(
                    "question extraction for lecture {} timed out",
                    lecture.id
                ))
            })?
    }

    async fn drive(&self, lecture: &Lecture) -> AppResult<String> {
        let room_id = lecture.room_id();
        let mut fragments = Vec::new();
        let mut page = 1;

        loop {
            let batch = self
                .paginator
                .next(&room_id, page, DEFAULT_BATCH_SIZE)
                .await?;
            if batch.is_empty() {
                break;
            }

            debug!(lecture = lecture.id, page, messages = batch.len(), "summarizing page");
            let fragment = self
                .summarizer
                .extract_questions(
                    &lecture.title,
                    lecture.description.as_deref(),
                    &format_slice(&batch),
                )
                .await?;

            fragments.push(fragment);
            page += 1;
        }

        info!(lecture = lecture.id, pages = fragments.len(), "extraction finished");
        Ok(fragments.join("\n"))
    }
}
