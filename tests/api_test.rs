//! End-to-end tests for the HTTP surface, exercising validation and the
//! store-backed paths without touching any external provider.

use std::sync::Arc;

use actix_web::{test, web, App};
use serde_json::{json, Value};
use tempfile::TempDir;

use mailtriage::api::{routes, AppState};
use mailtriage::classifier::Classifier;
use mailtriage::config::{ClassifierPolicy, Settings};
use mailtriage::store::AccountStore;
use mailtriage::testing::ScriptedCompletions;
use mailtriage::webhook::{PubSubMessage, WebhookEnvelope};

async fn test_state() -> (TempDir, web::Data<AppState>) {
    let dir = TempDir::new().unwrap();
    let mut settings = Settings::default();
    settings.store.path = dir
        .path()
        .join("store.json")
        .to_string_lossy()
        .into_owned();

    let store = Arc::new(AccountStore::new(&settings.store.path));
    store.initialize().await.unwrap();

    let classifier = Classifier::new(
        Arc::new(ScriptedCompletions::new(&[])),
        ClassifierPolicy::Trust,
    );
    (dir, web::Data::new(AppState::new(settings, store, classifier)))
}

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state.clone())
                .configure(routes::configure),
        )
        .await
    };
}

fn envelope(json_payload: &str) -> WebhookEnvelope {
    use base64::Engine as _;
    WebhookEnvelope {
        message: PubSubMessage {
            data: base64::engine::general_purpose::STANDARD.encode(json_payload),
            message_id: None,
        },
    }
}

#[actix_web::test]
async fn test_bulk_remove_requires_both_emails() {
    let (_dir, state) = test_state().await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/bulk_remove_mails")
        .set_json(json!({"user_email": "", "sender_email": "spam@x.com"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::post()
        .uri("/bulk_remove_mails")
        .set_json(json!({"user_email": "u@x.com", "sender_email": ""}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_bulk_remove_unknown_account_is_500() {
    let (_dir, state) = test_state().await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/bulk_remove_mails")
        .set_json(json!({"user_email": "ghost@x.com", "sender_email": "spam@x.com"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 500);
}

#[actix_web::test]
async fn test_delete_account_paths() {
    let (_dir, state) = test_state().await;
    state
        .store
        .set_watch_flag("user@example.com", false)
        .await
        .unwrap();
    let app = test_app!(state);

    // Empty email is a caller problem.
    let req = test::TestRequest::delete()
        .uri("/delete_account?email=")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    // Unknown account surfaces as a processing error.
    let req = test::TestRequest::delete()
        .uri("/delete_account?email=ghost@example.com")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 500);

    let req = test::TestRequest::delete()
        .uri("/delete_account?email=user@example.com")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Account deleted successfully");

    assert!(state
        .store
        .find_user("user@example.com")
        .await
        .unwrap()
        .is_none());
}

#[actix_web::test]
async fn test_update_labels_requires_fields() {
    let (_dir, state) = test_state().await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/update_labels")
        .set_json(json!({"email": "", "labels": [true]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::post()
        .uri("/update_labels")
        .set_json(json!({"email": "u@x.com", "labels": []}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_update_labels_without_credentials_persists_then_500s() {
    // The selection is stored before label creation needs a credential,
    // matching the original's update-then-create order.
    let (_dir, state) = test_state().await;
    let app = test_app!(state);

    let mut mask = vec![false; 12];
    mask[8] = true; // Finance
    let req = test::TestRequest::post()
        .uri("/update_labels")
        .set_json(json!({"email": "u@x.com", "labels": mask}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 500);

    let user = state.store.get_user("u@x.com").await.unwrap();
    assert_eq!(user.labels, vec!["Finance"]);
}

#[actix_web::test]
async fn test_gmail_watch_rejects_invalid_action() {
    let (_dir, state) = test_state().await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/gmail_watch")
        .set_json(json!({"email": "u@x.com", "action": "pause"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::post()
        .uri("/gmail_watch")
        .set_json(json!({"email": "u@x.com", "action": ""}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_past_email_sorter_validation() {
    let (_dir, state) = test_state().await;
    let app = test_app!(state);

    // No label selected in the mask.
    let req = test::TestRequest::post()
        .uri("/past_email_sorter")
        .set_json(json!({
            "user_email": "u@x.com",
            "sender_email": "s@x.com",
            "chosen_labels": [false, false, false, false],
            "messages_amount": "10"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    // Non-numeric amount.
    let req = test::TestRequest::post()
        .uri("/past_email_sorter")
        .set_json(json!({
            "user_email": "u@x.com",
            "sender_email": "s@x.com",
            "chosen_labels": [true, false, false, false],
            "messages_amount": "ten"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    // Empty mask counts as a missing field.
    let req = test::TestRequest::post()
        .uri("/past_email_sorter")
        .set_json(json!({
            "user_email": "u@x.com",
            "sender_email": "s@x.com",
            "chosen_labels": [],
            "messages_amount": "10"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_get_user_data_returns_labels_and_flag() {
    let (_dir, state) = test_state().await;
    state
        .store
        .set_user_labels(
            "user@example.com",
            vec!["Finance".to_string(), "Travel".to_string()],
        )
        .await
        .unwrap();
    state
        .store
        .set_watch_flag("user@example.com", true)
        .await
        .unwrap();
    let app = test_app!(state);

    let req = test::TestRequest::get()
        .uri("/get_user_data_ai_labeling?email=user@example.com")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!([["Finance", "Travel"], true]));

    let req = test::TestRequest::get()
        .uri("/get_user_data_ai_labeling?email=ghost@example.com")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 500);
}

#[actix_web::test]
async fn test_webhook_rejects_malformed_payload() {
    let (_dir, state) = test_state().await;
    let app = test_app!(state);

    let bad = WebhookEnvelope {
        message: PubSubMessage {
            data: "%%%".to_string(),
            message_id: None,
        },
    };
    let req = test::TestRequest::get()
        .uri("/webhook")
        .set_json(&bad)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::get()
        .uri("/webhook")
        .set_json(envelope(r#"{"historyId": 5}"#))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_webhook_acks_and_persists_checkpoint() {
    let (_dir, state) = test_state().await;
    let app = test_app!(state);

    // An unseen account: the checkpoint upsert creates it, downstream
    // reconciliation fails (no credentials) and is only logged.
    let req = test::TestRequest::get()
        .uri("/webhook")
        .set_json(envelope(r#"{"emailAddress": "new@example.com", "historyId": 777}"#))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Webhook data has been processed");

    let user = state.store.get_user("new@example.com").await.unwrap();
    assert_eq!(user.history_id.as_deref(), Some("777"));

    // A stale replay is acknowledged but does not move the checkpoint.
    let req = test::TestRequest::get()
        .uri("/webhook")
        .set_json(envelope(r#"{"emailAddress": "new@example.com", "historyId": 700}"#))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let user = state.store.get_user("new@example.com").await.unwrap();
    assert_eq!(user.history_id.as_deref(), Some("777"));
}
