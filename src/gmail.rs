//! Gmail REST client and the `Mailbox` seam the service layers work against.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::TriageError;

/// Visual metadata attached to a created label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LabelColor {
    pub text_color: String,
    pub background_color: String,
}

/// Request body for `users.labels.create`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLabel {
    pub name: String,
    pub message_list_visibility: String,
    pub label_list_visibility: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<LabelColor>,
}

impl NewLabel {
    /// A plain user label with the default visibility settings.
    pub fn plain(name: &str) -> Self {
        Self {
            name: name.to_string(),
            message_list_visibility: "show".to_string(),
            label_list_visibility: "labelShow".to_string(),
            color: None,
        }
    }

    pub fn colored(name: &str, color: LabelColor) -> Self {
        Self {
            color: Some(color),
            ..Self::plain(name)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmailLabel {
    pub id: String,
    pub name: String,
    /// "system" or "user".
    #[serde(rename = "type", default)]
    pub label_type: Option<String>,
}

impl GmailLabel {
    pub fn is_user_label(&self) -> bool {
        self.label_type.as_deref() == Some("user")
    }
}

#[derive(Debug, Deserialize)]
struct LabelList {
    #[serde(default)]
    labels: Option<Vec<GmailLabel>>,
}

/// Reference to a message, as returned by list and history endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Option<Vec<MessageRef>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(default)]
    pub headers: Vec<MessageHeader>,
}

/// A fetched message with the fields classification cares about.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDetail {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub payload: MessagePayload,
}

impl MessageDetail {
    /// Look up a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn subject(&self) -> Option<&str> {
        self.header("Subject")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyRequest {
    add_label_ids: Vec<String>,
    remove_label_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WatchRequest {
    label_ids: Vec<String>,
    topic_name: String,
}

/// Response from `users.watch`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchResponse {
    #[serde(default)]
    pub history_id: Option<String>,
    #[serde(default)]
    pub expiration: Option<String>,
}

/// A message-added entry inside a history record.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryMessage {
    pub message: MessageRef,
}

/// One mailbox change since a checkpoint. Only `messagesAdded` entries
/// are consumed; everything else deserializes to an empty list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub messages_added: Vec<HistoryMessage>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    history: Option<Vec<HistoryRecord>>,
}

/// Mailbox operations the triage pipeline needs. `GmailClient` is the
/// production implementation; tests supply doubles.
#[async_trait]
pub trait Mailbox: Send + Sync {
    async fn list_labels(&self) -> Result<Vec<GmailLabel>, TriageError>;
    async fn create_label(&self, label: &NewLabel) -> Result<GmailLabel, TriageError>;
    async fn list_messages(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<MessageRef>, TriageError>;
    async fn get_message(&self, id: &str) -> Result<MessageDetail, TriageError>;
    async fn add_labels(&self, id: &str, label_ids: Vec<String>) -> Result<(), TriageError>;
    async fn delete_message(&self, id: &str) -> Result<(), TriageError>;
    async fn list_history(&self, start_history_id: &str)
        -> Result<Vec<HistoryRecord>, TriageError>;
    async fn watch(&self, topic_name: &str) -> Result<WatchResponse, TriageError>;
    async fn stop_watch(&self) -> Result<(), TriageError>;
}

/// Thin Gmail REST API client authenticated with a bearer access token.
pub struct GmailClient {
    http: Client,
    access_token: String,
    api_base: String,
}

impl GmailClient {
    pub fn new(http: Client, access_token: String, api_base: String) -> Self {
        Self {
            http,
            access_token,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/gmail/v1/users/me/{}", self.api_base, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, TriageError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(TriageError::MailboxError(format!(
                "Gmail API returned {}: {}",
                status, body
            )))
        }
    }
}

#[async_trait]
impl Mailbox for GmailClient {
    async fn list_labels(&self) -> Result<Vec<GmailLabel>, TriageError> {
        let response = self
            .http
            .get(self.url("labels"))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let list: LabelList = Self::check(response).await?.json().await?;
        Ok(list.labels.unwrap_or_default())
    }

    async fn create_label(&self, label: &NewLabel) -> Result<GmailLabel, TriageError> {
        debug!("Creating Gmail label '{}'", label.name);
        let response = self
            .http
            .post(self.url("labels"))
            .bearer_auth(&self.access_token)
            .json(label)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn list_messages(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<MessageRef>, TriageError> {
        let url = format!(
            "{}?q={}&maxResults={}",
            self.url("messages"),
            urlencoding::encode(query),
            max_results
        );
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let list: MessageList = Self::check(response).await?.json().await?;
        Ok(list.messages.unwrap_or_default())
    }

    async fn get_message(&self, id: &str) -> Result<MessageDetail, TriageError> {
        let response = self
            .http
            .get(self.url(&format!("messages/{}", id)))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn add_labels(&self, id: &str, label_ids: Vec<String>) -> Result<(), TriageError> {
        let body = ModifyRequest {
            add_label_ids: label_ids,
            remove_label_ids: Vec::new(),
        };
        let response = self
            .http
            .post(self.url(&format!("messages/{}/modify", id)))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete_message(&self, id: &str) -> Result<(), TriageError> {
        let response = self
            .http
            .delete(self.url(&format!("messages/{}", id)))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn list_history(
        &self,
        start_history_id: &str,
    ) -> Result<Vec<HistoryRecord>, TriageError> {
        let url = format!(
            "{}?startHistoryId={}",
            self.url("history"),
            urlencoding::encode(start_history_id)
        );
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let history: HistoryResponse = Self::check(response).await?.json().await?;
        Ok(history.history.unwrap_or_default())
    }

    async fn watch(&self, topic_name: &str) -> Result<WatchResponse, TriageError> {
        let body = WatchRequest {
            label_ids: vec!["INBOX".to_string()],
            topic_name: topic_name.to_string(),
        };
        let response = self
            .http
            .post(self.url("watch"))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn stop_watch(&self) -> Result<(), TriageError> {
        let response = self
            .http
            .post(self.url("stop"))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
