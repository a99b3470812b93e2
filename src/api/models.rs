use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkRemoveRequest {
    pub user_email: String,
    pub sender_email: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

/// Selection mask over the fixed taxonomy order.
#[derive(Debug, Deserialize)]
pub struct LabelUpdateRequest {
    pub email: String,
    pub labels: Vec<bool>,
}

#[derive(Debug, Deserialize)]
pub struct WatchActionRequest {
    pub email: String,
    /// "start" or "stop".
    pub action: String,
}

#[derive(Debug, Deserialize)]
pub struct PastEmailSortRequest {
    pub user_email: String,
    pub sender_email: String,
    /// Selection mask over the sender-sorter label choices.
    pub chosen_labels: Vec<bool>,
    /// Number of messages to examine, as sent by the frontend.
    pub messages_amount: String,
}
