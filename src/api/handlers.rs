use actix_web::{web, HttpResponse, Responder};
use log::{debug, error, info, warn};
use serde_json::json;

use crate::api::models::{
    BulkRemoveRequest, EmailQuery, LabelUpdateRequest, MessageResponse, PastEmailSortRequest,
    WatchActionRequest,
};
use crate::api::AppState;
use crate::error::TriageError;
use crate::gmail::Mailbox;
use crate::{history, labels, sender_ops, watch, webhook};

fn require(field: &str, value: &str) -> Result<(), TriageError> {
    if value.is_empty() {
        Err(TriageError::MissingField(field.to_string()))
    } else {
        Ok(())
    }
}

/// POST /bulk_remove_mails
pub async fn bulk_remove_mails(
    req: web::Json<BulkRemoveRequest>,
    state: web::Data<AppState>,
) -> Result<impl Responder, TriageError> {
    debug!("Handling POST /bulk_remove_mails");
    require("user_email", &req.user_email)?;
    require("sender_email", &req.sender_email)?;

    let credential = state.credentials.resolve(&req.user_email).await?;
    let mailbox = state.mailbox_for(&credential);
    let message = sender_ops::delete_by_sender(&mailbox, &req.sender_email).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new(message)))
}

/// DELETE /delete_account
pub async fn delete_account(
    query: web::Query<EmailQuery>,
    state: web::Data<AppState>,
) -> Result<impl Responder, TriageError> {
    debug!("Handling DELETE /delete_account");
    require("email", &query.email)?;

    state.store.delete_account(&query.email).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Account deleted successfully")))
}

/// POST /update_labels
pub async fn update_labels(
    req: web::Json<LabelUpdateRequest>,
    state: web::Data<AppState>,
) -> Result<impl Responder, TriageError> {
    debug!("Handling POST /update_labels");
    require("email", &req.email)?;
    if req.labels.is_empty() {
        return Err(TriageError::MissingField("labels".to_string()));
    }

    let names = labels::selection_to_names(&req.labels);

    let _guard = state.locks.acquire(&req.email).await;
    state.store.set_user_labels(&req.email, names.clone()).await?;

    let credential = state.credentials.resolve(&req.email).await?;
    let mailbox = state.mailbox_for(&credential);
    labels::ensure_labels(&mailbox, &names).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new(format!(
        "Labels updated for user {}",
        req.email
    ))))
}

/// POST /gmail_watch
pub async fn gmail_watch(
    req: web::Json<WatchActionRequest>,
    state: web::Data<AppState>,
) -> Result<impl Responder, TriageError> {
    debug!("Handling POST /gmail_watch");
    require("email", &req.email)?;
    require("action", &req.action)?;

    let enabled = match req.action.as_str() {
        "start" => true,
        "stop" => false,
        other => {
            return Err(TriageError::InvalidRequest(format!(
                "Invalid action '{}'. Allowed actions are 'start' and 'stop'.",
                other
            )))
        }
    };

    let credential = state.credentials.resolve(&req.email).await?;
    let mailbox = state.mailbox_for(&credential);
    watch::set_watch(
        &state.store,
        &mailbox,
        &state.settings.gmail.topic_name,
        &req.email,
        enabled,
    )
    .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new(format!(
        "Gmail watch {}ed successfully",
        req.action
    ))))
}

/// POST /past_email_sorter
pub async fn past_email_sorter(
    req: web::Json<PastEmailSortRequest>,
    state: web::Data<AppState>,
) -> Result<impl Responder, TriageError> {
    debug!("Handling POST /past_email_sorter");
    require("user_email", &req.user_email)?;
    require("sender_email", &req.sender_email)?;
    if req.chosen_labels.is_empty() {
        return Err(TriageError::MissingField("chosen_labels".to_string()));
    }

    let label = req
        .chosen_labels
        .iter()
        .position(|&chosen| chosen)
        .and_then(|idx| sender_ops::SENDER_LABEL_CHOICES.get(idx))
        .ok_or_else(|| TriageError::InvalidRequest("Valid label not selected".to_string()))?;

    let max_count: u32 = req.messages_amount.trim().parse().map_err(|_| {
        TriageError::InvalidRequest(format!(
            "messages_amount must be a number, got '{}'",
            req.messages_amount
        ))
    })?;

    let credential = state.credentials.resolve(&req.user_email).await?;
    let mailbox = state.mailbox_for(&credential);

    // Label creation for this sender must not race a concurrent sort.
    let _guard = state.locks.acquire(&req.user_email).await;
    let labeled = sender_ops::label_by_sender(
        &mailbox,
        &state.classifier,
        &req.sender_email,
        label,
        max_count,
    )
    .await?;
    info!(
        "Past email sorter labeled {} message(s) for {}",
        labeled, req.user_email
    );

    Ok(HttpResponse::Ok().json(MessageResponse::new("Emails filtered successfully!")))
}

/// GET /get_user_data_ai_labeling
pub async fn get_user_data(
    query: web::Query<EmailQuery>,
    state: web::Data<AppState>,
) -> Result<impl Responder, TriageError> {
    debug!("Handling GET /get_user_data_ai_labeling");
    require("email", &query.email)?;

    let user = state
        .store
        .find_user(&query.email)
        .await?
        .ok_or_else(|| TriageError::NotFound(format!("user {}", query.email)))?;

    Ok(HttpResponse::Ok().json(json!([user.labels, user.watch_enabled])))
}

/// GET /webhook
///
/// Pub/Sub expects a fast 2xx; reconciliation failures are logged, not
/// surfaced. Only decode/validation problems (400) and store failures
/// (500) reach the caller.
pub async fn webhook(
    req: web::Json<webhook::WebhookEnvelope>,
    state: web::Data<AppState>,
) -> Result<impl Responder, TriageError> {
    let (account_email, history_id) = webhook::decode_envelope(&req)?;
    debug!(
        "Webhook notification for {} (history_id={})",
        account_email, history_id
    );

    let _guard = state.locks.acquire(&account_email).await;
    let start = webhook::advance_checkpoint(&state.store, &account_email, history_id).await?;

    if let Some(since) = start {
        match state.credentials.resolve(&account_email).await {
            Ok(credential) => {
                let mailbox = state.mailbox_for(&credential);
                match history::reconcile(
                    &state.store,
                    &mailbox as &dyn Mailbox,
                    &state.classifier,
                    &account_email,
                    &since,
                )
                .await
                {
                    Ok(labeled) if labeled > 0 => {
                        info!("Labeled {} new message(s) for {}", labeled, account_email)
                    }
                    Ok(_) => {}
                    Err(TriageError::WatchNotEnabled(_)) => {
                        warn!("Gmail watch not enabled for {}", account_email)
                    }
                    Err(e) => error!("Reconciliation failed for {}: {}", account_email, e),
                }
            }
            Err(e) => warn!("No usable credentials for {}: {}", account_email, e),
        }
    }

    Ok(HttpResponse::Ok().json(MessageResponse::new("Webhook data has been processed")))
}
