//! Webhook Ingress: decode Gmail Pub/Sub push envelopes and advance the
//! per-account history checkpoint.

use base64::Engine as _;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::TriageError;
use crate::store::AccountStore;

/// Pub/Sub push envelope as delivered to the webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub message: PubSubMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubSubMessage {
    /// Base64-encoded JSON notification.
    pub data: String,
    #[serde(rename = "messageId", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// The decoded notification payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailNotification {
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub history_id: Option<u64>,
}

/// Decode and validate an envelope into `(account_email, checkpoint)`.
pub fn decode_envelope(envelope: &WebhookEnvelope) -> Result<(String, u64), TriageError> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(&envelope.message.data)
        .map_err(|e| TriageError::MalformedPayload(format!("base64 decode failed: {}", e)))?;

    let notification: GmailNotification = serde_json::from_slice(&decoded)
        .map_err(|e| TriageError::MalformedPayload(format!("invalid JSON payload: {}", e)))?;

    let email = notification
        .email_address
        .filter(|e| !e.is_empty())
        .ok_or_else(|| TriageError::MissingField("emailAddress".to_string()))?;
    let history_id = notification
        .history_id
        .ok_or_else(|| TriageError::MissingField("historyId".to_string()))?;

    Ok((email, history_id))
}

/// Persist the webhook-supplied checkpoint (creating the account if
/// unseen) and return the reconciliation start point: the *previous*
/// stored checkpoint, or the payload's own when none was stored.
///
/// Returns `None` when the notification's checkpoint is not newer than
/// the stored one; the stored value is left untouched and the event is
/// not reprocessed.
pub async fn advance_checkpoint(
    store: &AccountStore,
    account_email: &str,
    history_id: u64,
) -> Result<Option<String>, TriageError> {
    let previous = store
        .find_user(account_email)
        .await?
        .and_then(|u| u.history_id);

    if let Some(prev) = previous.as_deref().and_then(|p| p.parse::<u64>().ok()) {
        if history_id <= prev {
            debug!(
                "Ignoring stale notification for {} (history_id {} <= {})",
                account_email, history_id, prev
            );
            return Ok(None);
        }
    }

    store
        .set_history_id(account_email, &history_id.to_string())
        .await?;

    Ok(Some(previous.unwrap_or_else(|| history_id.to_string())))
}
