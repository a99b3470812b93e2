//! Bulk operations scoped to all messages from one sender.

use log::{error, info, warn};

use crate::classifier::Classifier;
use crate::error::TriageError;
use crate::gmail::Mailbox;
use crate::labels;

/// The categories the past-email sorter can be pointed at.
pub const SENDER_LABEL_CHOICES: &[&str] = &["Alerts", "Deliveries", "Receipts", "Updates"];

/// Confirmation returned by the bulk delete regardless of per-message
/// failures.
pub const DELETE_CONFIRMATION: &str = "Delete Ended Successfully!";

/// Cap on the bulk delete query.
const DELETE_BATCH_LIMIT: u32 = 500;

/// Label up to `max_count` recent messages from `sender_email` under a
/// `senderLocalPart/label_name` hierarchy, asking the model per message
/// whether the label fits. Subject-less messages are skipped without a
/// classification attempt. A classifier failure aborts the remaining
/// batch.
///
/// Returns the number of messages labeled.
pub async fn label_by_sender(
    mailbox: &dyn Mailbox,
    classifier: &Classifier,
    sender_email: &str,
    label_name: &str,
    max_count: u32,
) -> Result<usize, TriageError> {
    let sender_name = sender_email.split('@').next().unwrap_or(sender_email);

    let messages = mailbox
        .list_messages(&format!("from:{}", sender_email), max_count)
        .await?;

    labels::get_or_create_label(mailbox, sender_name, None).await?;
    let child_label_id = labels::get_or_create_label(mailbox, label_name, Some(sender_name)).await?;

    let mut labeled = 0;
    for reference in messages {
        let message = mailbox.get_message(&reference.id).await?;

        if message.label_ids.iter().any(|id| id == &child_label_id) {
            info!("Message {} already labeled, skipping", reference.id);
            continue;
        }

        let subject = match message.subject() {
            Some(subject) => subject,
            None => {
                warn!("Subject not found for message {}", reference.id);
                continue;
            }
        };

        if classifier
            .fits_label(label_name, subject, &message.snippet)
            .await?
        {
            mailbox
                .add_labels(&reference.id, vec![child_label_id.clone()])
                .await?;
            labeled += 1;
        }
    }

    info!(
        "Labeled {} message(s) from {} as {}/{}",
        labeled, sender_email, sender_name, label_name
    );
    Ok(labeled)
}

/// Permanently delete up to 500 messages from `sender_email`. Individual
/// delete failures are logged and do not abort the rest; the confirmation
/// message is returned regardless of the partial failure count.
pub async fn delete_by_sender(
    mailbox: &dyn Mailbox,
    sender_email: &str,
) -> Result<&'static str, TriageError> {
    let messages = mailbox
        .list_messages(&format!("from:{}", sender_email), DELETE_BATCH_LIMIT)
        .await?;

    for reference in messages {
        if let Err(e) = mailbox.delete_message(&reference.id).await {
            error!("Error deleting message {}: {}", reference.id, e);
        }
    }

    info!("Bulk delete finished for sender {}", sender_email);
    Ok(DELETE_CONFIRMATION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierPolicy;
    use crate::testing::{MockMailbox, ScriptedCompletions};
    use std::sync::Arc;

    fn classifier_with(provider: Arc<ScriptedCompletions>) -> Classifier {
        Classifier::new(provider, ClassifierPolicy::Trust)
    }

    #[tokio::test]
    async fn test_delete_by_sender_swallows_partial_failure() {
        let mailbox = MockMailbox::new();
        mailbox.seed_message("m1", Some("a"), "", &[]);
        mailbox.seed_message("m2", Some("b"), "", &[]);
        mailbox.seed_message("m3", Some("c"), "", &[]);
        mailbox.fail_delete_of("m2");

        let message = delete_by_sender(&mailbox, "spam@example.com").await.unwrap();

        assert_eq!(message, DELETE_CONFIRMATION);
        assert_eq!(mailbox.deleted(), vec!["m1", "m3"]);
        assert_eq!(
            mailbox.last_query().as_deref(),
            Some("from:spam@example.com")
        );
    }

    #[tokio::test]
    async fn test_label_by_sender_applies_on_affirmative_only() {
        let mailbox = MockMailbox::new();
        mailbox.seed_message("m1", Some("Your package shipped"), "tracking inside", &[]);
        mailbox.seed_message("m2", Some("Weekly digest"), "news", &[]);

        let provider = Arc::new(ScriptedCompletions::new(&["YES", "NO"]));
        let classifier = classifier_with(provider.clone());

        let labeled = label_by_sender(&mailbox, &classifier, "shop@acme.com", "Deliveries", 10)
            .await
            .unwrap();

        assert_eq!(labeled, 1);
        // The hierarchy uses the sender's local part as the parent.
        let names: Vec<String> = mailbox.labels().iter().map(|l| l.name.clone()).collect();
        assert!(names.contains(&"shop".to_string()));
        assert!(names.contains(&"shop/Deliveries".to_string()));
        assert!(!mailbox.message_labels("m1").is_empty());
        assert!(mailbox.message_labels("m2").is_empty());
    }

    #[tokio::test]
    async fn test_label_by_sender_skips_subjectless_without_classifying() {
        let mailbox = MockMailbox::new();
        mailbox.seed_message("m1", None, "no subject header", &[]);

        let provider = Arc::new(ScriptedCompletions::new(&["YES"]));
        let classifier = classifier_with(provider.clone());

        let labeled = label_by_sender(&mailbox, &classifier, "x@y.com", "Alerts", 10)
            .await
            .unwrap();

        assert_eq!(labeled, 0);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_label_by_sender_skips_already_labeled() {
        let mailbox = MockMailbox::new();
        // Pre-create the hierarchy so the child id is stable.
        mailbox.seed_label("Label_9", "x");
        mailbox.seed_label("Label_10", "x/Alerts");
        mailbox.seed_message("m1", Some("Alert"), "content", &["Label_10"]);

        let provider = Arc::new(ScriptedCompletions::new(&["YES"]));
        let classifier = classifier_with(provider.clone());

        let labeled = label_by_sender(&mailbox, &classifier, "x@y.com", "Alerts", 10)
            .await
            .unwrap();

        assert_eq!(labeled, 0);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_label_by_sender_aborts_batch_on_classifier_failure() {
        let mailbox = MockMailbox::new();
        mailbox.seed_message("m1", Some("a"), "1", &[]);
        mailbox.seed_message("m2", Some("b"), "2", &[]);

        let classifier = classifier_with(Arc::new(ScriptedCompletions::failing()));
        let result = label_by_sender(&mailbox, &classifier, "x@y.com", "Alerts", 10).await;

        assert!(matches!(result, Err(TriageError::ClassificationFailed(_))));
        assert!(mailbox.message_labels("m1").is_empty());
        assert!(mailbox.message_labels("m2").is_empty());
    }
}
