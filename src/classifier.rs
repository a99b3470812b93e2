//! Language-model classification of messages into taxonomy labels.

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{ClassifierPolicy, OpenAiConfig};
use crate::error::TriageError;
use crate::labels::FALLBACK_LABEL;

/// The exact token a yes/no completion must return to count as a match.
/// Any other response, including a differently-cased "yes", is a no.
pub const AFFIRMATIVE: &str = "YES";

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: String) -> Self {
        Self {
            role: "user".to_string(),
            content,
        }
    }
}

/// Single-completion seam between the classifier and the model provider.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, TriageError>;
}

#[derive(Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: ChatMessage,
}

/// OpenAI chat-completions adapter.
pub struct OpenAiProvider {
    api_key: String,
    http: Client,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, http: Client, model: String) -> Self {
        Self { api_key, http, model }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, TriageError> {
        let payload = OpenAiChatRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
        };

        debug!("Sending completion request (model={})", payload.model);

        let response = self
            .http
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| {
                TriageError::ClassificationFailed(format!("network error calling OpenAI: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TriageError::ClassificationFailed(format!(
                "OpenAI returned {}: {}",
                status, body
            )));
        }

        let body: OpenAiChatResponse = response.json().await.map_err(|e| {
            TriageError::ClassificationFailed(format!("failed to parse OpenAI response: {}", e))
        })?;

        body.choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| {
                TriageError::ClassificationFailed("OpenAI response contained no choices".into())
            })
    }
}

/// Classifies messages by asking the model to pick or confirm a label.
pub struct Classifier {
    provider: std::sync::Arc<dyn CompletionProvider>,
    policy: ClassifierPolicy,
}

impl Classifier {
    pub fn new(provider: std::sync::Arc<dyn CompletionProvider>, policy: ClassifierPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn from_config(config: &OpenAiConfig, http: Client) -> Self {
        let provider = OpenAiProvider::new(config.api_key.clone(), http, config.model.clone());
        Self::new(std::sync::Arc::new(provider), config.policy)
    }

    /// Pick the best-fitting label for a message out of `candidates`.
    ///
    /// With the `trust` policy the raw trimmed completion is returned
    /// verbatim; `strict` substitutes the catch-all category when the
    /// answer is not one of the candidates.
    pub async fn choose_label(
        &self,
        candidates: &[String],
        subject: &str,
        snippet: &str,
    ) -> Result<String, TriageError> {
        let prompt = format!(
            "You are a professional email sorter. \
             I will give you an email subject and content along with a list of labels. \
             Choose the most appropriate label from the list.\n\n\
             Subject: {}\nContent: {}\nLabels: {:?}",
            subject, snippet, candidates
        );
        let raw = self
            .provider
            .complete(&[ChatMessage::user(prompt)])
            .await?;
        let choice = raw.trim().to_string();

        match self.policy {
            ClassifierPolicy::Trust => Ok(choice),
            ClassifierPolicy::Strict => {
                if candidates.iter().any(|c| c == &choice) {
                    Ok(choice)
                } else {
                    warn!(
                        "Model answered '{}' which is not a candidate, using '{}'",
                        choice, FALLBACK_LABEL
                    );
                    Ok(FALLBACK_LABEL.to_string())
                }
            }
        }
    }

    /// Strict yes/no: does `label` fit the message? True iff the trimmed
    /// response equals [`AFFIRMATIVE`] exactly.
    pub async fn fits_label(
        &self,
        label: &str,
        subject: &str,
        snippet: &str,
    ) -> Result<bool, TriageError> {
        let prompt = format!(
            "You are a professional email sorter. \
             I will give you an email subject and content along with a single label. \
             Determine if the label fits the email.\n\n\
             Subject: {}\nContent: {}\nLabel: {}\n\
             Respond with '{}' or 'NO'.",
            subject, snippet, label, AFFIRMATIVE
        );
        let raw = self
            .provider
            .complete(&[ChatMessage::user(prompt)])
            .await?;
        Ok(raw.trim() == AFFIRMATIVE)
    }
}
