//! External summarization boundary. The pipeline only sees the `Summarizer`
//! trait; the OpenAI-backed implementation lives here.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

const COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Picks the actual questions out of one formatted transcript slice.
    /// May fail or return empty text; no latency bound.
    async fn extract_questions(
        &self,
        lecture_title: &str,
        lecture_description: Option<&str>,
        transcript_slice: &str,
    ) -> anyhow::Result<String>;
}

pub struct OpenAiSummarizer {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiSummarizer {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        }
    }
}

#[derive(Deserialize)]
struct Completion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn extract_questions(
        &self,
        lecture_title: &str,
        lecture_description: Option<&str>,
        transcript_slice: &str,
    ) -> anyhow::Result<String> {
        let prompt = format!(
            "We have a lecture called \"{}\" with this description: \"{}\". \
             You will be given chat messages sent during the lecture, each prefixed \
             with the sender's email. Pick out only the messages that are actually \
             questions (they do not always end with a question mark, judge from \
             context) and that are about the subject of the lecture. Return those \
             messages together with the sender's email.",
            lecture_title,
            lecture_description.unwrap_or(""),
        );

        let response: Completion = self
            .client
            .post(COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": prompt },
                    {
                        "role": "user",
                        "content": format!(
                            "Here is the list of messages, each with the sender's email:\n{transcript_slice}"
                        ),
                    },
                ],
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("summarization response had no content"))?;

        Ok(content.trim().to_owned())
    }
}
