//! Test doubles for the mailbox and completion-provider seams.
//!
//! Kept public so integration tests can reuse them.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::classifier::{ChatMessage, CompletionProvider};
use crate::error::TriageError;
use crate::gmail::{
    GmailLabel, HistoryMessage, HistoryRecord, Mailbox, MessageDetail, MessageHeader,
    MessagePayload, MessageRef, NewLabel, WatchResponse,
};

#[derive(Default)]
struct MailboxState {
    labels: Vec<GmailLabel>,
    created: usize,
    next_label_id: usize,
    messages: Vec<MessageDetail>,
    deleted: Vec<String>,
    fail_delete: Option<String>,
    history: Vec<HistoryRecord>,
    fail_history: bool,
    queries: Vec<String>,
    watch_topic: Option<String>,
    watch_stopped: bool,
}

/// In-memory mailbox double backing the `Mailbox` trait.
#[derive(Default)]
pub struct MockMailbox {
    state: Mutex<MailboxState>,
}

impl MockMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_label(&self, id: &str, name: &str) {
        self.state.lock().unwrap().labels.push(GmailLabel {
            id: id.to_string(),
            name: name.to_string(),
            label_type: Some("user".to_string()),
        });
    }

    pub fn seed_message(&self, id: &str, subject: Option<&str>, snippet: &str, labels: &[&str]) {
        let headers = subject
            .map(|s| {
                vec![MessageHeader {
                    name: "Subject".to_string(),
                    value: s.to_string(),
                }]
            })
            .unwrap_or_default();
        self.state.lock().unwrap().messages.push(MessageDetail {
            id: id.to_string(),
            label_ids: labels.iter().map(|l| l.to_string()).collect(),
            snippet: snippet.to_string(),
            payload: MessagePayload { headers },
        });
    }

    /// Seed one history record containing the given added-message ids.
    pub fn seed_history_added(&self, record_id: &str, message_ids: &[&str]) {
        self.state.lock().unwrap().history.push(HistoryRecord {
            id: Some(record_id.to_string()),
            messages_added: message_ids
                .iter()
                .map(|id| HistoryMessage {
                    message: MessageRef {
                        id: id.to_string(),
                        thread_id: None,
                    },
                })
                .collect(),
        });
    }

    pub fn fail_history(&self) {
        self.state.lock().unwrap().fail_history = true;
    }

    pub fn fail_delete_of(&self, id: &str) {
        self.state.lock().unwrap().fail_delete = Some(id.to_string());
    }

    pub fn labels(&self) -> Vec<GmailLabel> {
        self.state.lock().unwrap().labels.clone()
    }

    pub fn created_count(&self) -> usize {
        self.state.lock().unwrap().created
    }

    pub fn message_labels(&self, id: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.label_ids.clone())
            .unwrap_or_default()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn last_query(&self) -> Option<String> {
        self.state.lock().unwrap().queries.last().cloned()
    }

    pub fn watch_topic(&self) -> Option<String> {
        self.state.lock().unwrap().watch_topic.clone()
    }

    pub fn watch_stopped(&self) -> bool {
        self.state.lock().unwrap().watch_stopped
    }
}

#[async_trait]
impl Mailbox for MockMailbox {
    async fn list_labels(&self) -> Result<Vec<GmailLabel>, TriageError> {
        Ok(self.state.lock().unwrap().labels.clone())
    }

    async fn create_label(&self, label: &NewLabel) -> Result<GmailLabel, TriageError> {
        let mut state = self.state.lock().unwrap();
        state.next_label_id += 1;
        state.created += 1;
        let created = GmailLabel {
            id: format!("Label_{}", state.next_label_id),
            name: label.name.clone(),
            label_type: Some("user".to_string()),
        };
        state.labels.push(created.clone());
        Ok(created)
    }

    async fn list_messages(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<MessageRef>, TriageError> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(query.to_string());
        Ok(state
            .messages
            .iter()
            .take(max_results as usize)
            .map(|m| MessageRef {
                id: m.id.clone(),
                thread_id: None,
            })
            .collect())
    }

    async fn get_message(&self, id: &str) -> Result<MessageDetail, TriageError> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| TriageError::MailboxError(format!("message {} not found", id)))
    }

    async fn add_labels(&self, id: &str, label_ids: Vec<String>) -> Result<(), TriageError> {
        let mut state = self.state.lock().unwrap();
        let message = state
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| TriageError::MailboxError(format!("message {} not found", id)))?;
        message.label_ids.extend(label_ids);
        Ok(())
    }

    async fn delete_message(&self, id: &str) -> Result<(), TriageError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_delete.as_deref() == Some(id) {
            return Err(TriageError::MailboxError(format!(
                "delete of {} rejected",
                id
            )));
        }
        state.deleted.push(id.to_string());
        Ok(())
    }

    async fn list_history(
        &self,
        _start_history_id: &str,
    ) -> Result<Vec<HistoryRecord>, TriageError> {
        let state = self.state.lock().unwrap();
        if state.fail_history {
            return Err(TriageError::MailboxError("history unavailable".into()));
        }
        Ok(state.history.clone())
    }

    async fn watch(&self, topic_name: &str) -> Result<WatchResponse, TriageError> {
        self.state.lock().unwrap().watch_topic = Some(topic_name.to_string());
        Ok(WatchResponse {
            history_id: Some("1".to_string()),
            expiration: None,
        })
    }

    async fn stop_watch(&self) -> Result<(), TriageError> {
        self.state.lock().unwrap().watch_stopped = true;
        Ok(())
    }
}

/// Completion provider that replays a fixed sequence of answers.
pub struct ScriptedCompletions {
    responses: Mutex<VecDeque<String>>,
    fail: bool,
    calls: Mutex<usize>,
}

impl ScriptedCompletions {
    pub fn new(responses: &[&str]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
            fail: false,
            calls: Mutex::new(0),
        }
    }

    /// A provider whose every call fails like a network error.
    pub fn failing() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fail: true,
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletions {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, TriageError> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            return Err(TriageError::ClassificationFailed(
                "scripted provider failure".into(),
            ));
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TriageError::ClassificationFailed("script exhausted".into()))
    }
}
