//! History reconciliation: turn a change log since a checkpoint into
//! classified, labeled messages.

use std::collections::HashSet;

use log::{debug, error, info, warn};

use crate::classifier::Classifier;
use crate::error::TriageError;
use crate::gmail::Mailbox;
use crate::labels;
use crate::store::AccountStore;

/// Process every message added since `since_checkpoint` for the account.
///
/// The watch flag being off is a hard precondition failure. An empty or
/// failed history fetch is a non-fatal no-op. Individual message failures
/// are logged and do not abort the rest of the batch. The checkpoint is
/// never written here; the webhook ingress owns it.
///
/// Returns the number of messages that were classified and labeled.
pub async fn reconcile(
    store: &AccountStore,
    mailbox: &dyn Mailbox,
    classifier: &Classifier,
    account_email: &str,
    since_checkpoint: &str,
) -> Result<usize, TriageError> {
    let user = store
        .find_user(account_email)
        .await?
        .ok_or_else(|| TriageError::NotFound(format!("user {}", account_email)))?;

    if !user.watch_enabled {
        return Err(TriageError::WatchNotEnabled(account_email.to_string()));
    }

    let history = match mailbox.list_history(since_checkpoint).await {
        Ok(history) => history,
        Err(e) => {
            error!(
                "Error fetching history for {} since {}: {}",
                account_email, since_checkpoint, e
            );
            return Ok(0);
        }
    };

    // Provider-supplied order, flattened across records.
    let added: Vec<String> = history
        .iter()
        .flat_map(|record| record.messages_added.iter())
        .map(|entry| entry.message.id.clone())
        .collect();

    if added.is_empty() {
        info!("No new messages for {}", account_email);
        return Ok(0);
    }

    // Resolve the account's custom-label id set once per pass; "already
    // categorized" is membership in this set, not an id-prefix pattern.
    let taxonomy_ids: HashSet<String> = mailbox
        .list_labels()
        .await?
        .into_iter()
        .filter(|l| l.is_user_label() && user.labels.iter().any(|name| name == &l.name))
        .map(|l| l.id)
        .collect();

    let mut labeled = 0;
    for message_id in added {
        let message = match mailbox.get_message(&message_id).await {
            Ok(message) => message,
            Err(e) => {
                error!("Error fetching message {}: {}", message_id, e);
                continue;
            }
        };

        if message.label_ids.iter().any(|id| taxonomy_ids.contains(id)) {
            debug!("Message {} already categorized, skipping", message_id);
            continue;
        }

        let subject = match message.subject() {
            Some(subject) => subject,
            None => {
                warn!("Subject not found for message {}", message_id);
                continue;
            }
        };

        let label = match classifier
            .choose_label(&user.labels, subject, &message.snippet)
            .await
        {
            Ok(label) => label,
            Err(e) => {
                error!("Classification failed for message {}: {}", message_id, e);
                continue;
            }
        };

        if let Err(e) = labels::apply_label(mailbox, &message_id, &label).await {
            error!("Error labeling message {}: {}", message_id, e);
            continue;
        }
        labeled += 1;
    }

    Ok(labeled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierPolicy;
    use crate::testing::{MockMailbox, ScriptedCompletions};
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn store_with_user(watch_enabled: bool) -> (TempDir, AccountStore) {
        let dir = TempDir::new().unwrap();
        let store = AccountStore::new(dir.path().join("store.json"));
        store.initialize().await.unwrap();
        store
            .set_user_labels(
                "user@example.com",
                vec!["Finance".to_string(), "Travel".to_string()],
            )
            .await
            .unwrap();
        store
            .set_watch_flag("user@example.com", watch_enabled)
            .await
            .unwrap();
        (dir, store)
    }

    fn classifier(responses: &[&str]) -> Classifier {
        Classifier::new(
            Arc::new(ScriptedCompletions::new(responses)),
            ClassifierPolicy::Trust,
        )
    }

    #[tokio::test]
    async fn test_watch_disabled_is_a_hard_precondition() {
        let (_dir, store) = store_with_user(false).await;
        let mailbox = MockMailbox::new();
        let result = reconcile(
            &store,
            &mailbox,
            &classifier(&[]),
            "user@example.com",
            "100",
        )
        .await;
        assert!(matches!(result, Err(TriageError::WatchNotEnabled(_))));
    }

    #[tokio::test]
    async fn test_history_error_is_a_noop() {
        let (_dir, store) = store_with_user(true).await;
        let mailbox = MockMailbox::new();
        mailbox.fail_history();
        let labeled = reconcile(
            &store,
            &mailbox,
            &classifier(&[]),
            "user@example.com",
            "100",
        )
        .await
        .unwrap();
        assert_eq!(labeled, 0);
    }

    #[tokio::test]
    async fn test_reconcile_labels_new_uncategorized_messages() {
        let (_dir, store) = store_with_user(true).await;
        let mailbox = MockMailbox::new();
        mailbox.seed_label("Label_1", "Finance");

        // m1: fresh, should be classified and labeled.
        mailbox.seed_message("m1", Some("Your flight receipt"), "flight BA123", &["INBOX"]);
        // m2: already carries a taxonomy label id, skipped.
        mailbox.seed_message("m2", Some("Invoice"), "pay now", &["INBOX", "Label_1"]);
        // m3: no subject header, skipped with a warning.
        mailbox.seed_message("m3", None, "mystery", &["INBOX"]);
        mailbox.seed_history_added("101", &["m1", "m2", "m3"]);

        let provider = Arc::new(ScriptedCompletions::new(&["Finance"]));
        let classifier = Classifier::new(provider.clone(), ClassifierPolicy::Trust);

        let labeled = reconcile(&store, &mailbox, &classifier, "user@example.com", "100")
            .await
            .unwrap();

        assert_eq!(labeled, 1);
        assert!(mailbox.message_labels("m1").contains(&"Label_1".to_string()));
        // Only m1 reached the model.
        assert_eq!(provider.call_count(), 1);
        // m2 was not re-labeled.
        assert_eq!(mailbox.message_labels("m2"), vec!["INBOX", "Label_1"]);
    }

    #[tokio::test]
    async fn test_single_message_failure_does_not_abort_batch() {
        let (_dir, store) = store_with_user(true).await;
        let mailbox = MockMailbox::new();
        mailbox.seed_label("Label_1", "Finance");
        mailbox.seed_message("m1", Some("Receipt"), "order 1", &["INBOX"]);
        mailbox.seed_message("m2", Some("Receipt"), "order 2", &["INBOX"]);
        mailbox.seed_history_added("101", &["m1", "m2"]);

        // The script runs dry after the first answer, so classifying m2
        // fails; m1 must still have been labeled.
        let labeled = reconcile(
            &store,
            &mailbox,
            &classifier(&["Finance"]),
            "user@example.com",
            "100",
        )
        .await
        .unwrap();

        assert_eq!(labeled, 1);
        assert!(mailbox.message_labels("m1").contains(&"Label_1".to_string()));
        assert_eq!(mailbox.message_labels("m2"), vec!["INBOX"]);
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = AccountStore::new(dir.path().join("store.json"));
        store.initialize().await.unwrap();
        let mailbox = MockMailbox::new();
        let result = reconcile(
            &store,
            &mailbox,
            &classifier(&[]),
            "ghost@example.com",
            "1",
        )
        .await;
        assert!(matches!(result, Err(TriageError::NotFound(_))));
    }
}
