//! The fixed label taxonomy and the Label Directory operations.
//!
//! Label existence and identifiers are owned entirely by Gmail; every
//! resolution here re-queries the current label list rather than keeping
//! a local mirror.

use log::{info, warn};

use crate::error::TriageError;
use crate::gmail::{LabelColor, Mailbox, NewLabel};

/// The platform taxonomy, in the order the selection mask refers to it.
pub const TAXONOMY: &[&str] = &[
    "Newsletters/Subscriptions",
    "Shopping/Online Orders",
    "Events/Invitations",
    "Receipts/Invoices",
    "Education/School",
    "Health/Wellness",
    "Social Media",
    "Deliveries",
    "Finance",
    "Travel",
    "Alerts",
    "Other",
];

/// Catch-all category used by the strict classifier policy.
pub const FALLBACK_LABEL: &str = "Other";

/// Display color for a taxonomy entry. `None` means the name is not part
/// of the platform taxonomy.
pub fn label_color(name: &str) -> Option<LabelColor> {
    let (text, background) = match name {
        "Receipts/Invoices" => ("#ffffff", "#000000"),
        "Newsletters/Subscriptions" => ("#ffffff", "#434343"),
        "Events/Invitations" => ("#ffffff", "#83334c"),
        "Education/School" => ("#ffffff", "#cf8933"),
        "Health/Wellness" => ("#000000", "#662e37"),
        "Social Media" => ("#000000", "#4986e7"),
        "Deliveries" => ("#000000", "#f3f3f3"),
        "Finance" => ("#000000", "#ffffff"),
        "Shopping/Online Orders" => ("#ffffff", "#fb4c2f"),
        "Travel" => ("#ffffff", "#ffad47"),
        "Alerts" => ("#ffffff", "#822111"),
        "Other" => ("#000000", "#666666"),
        _ => return None,
    };
    Some(LabelColor {
        text_color: text.to_string(),
        background_color: background.to_string(),
    })
}

/// Map a boolean selection mask over [`TAXONOMY`] to the enabled names.
pub fn selection_to_names(mask: &[bool]) -> Vec<String> {
    TAXONOMY
        .iter()
        .zip(mask.iter())
        .filter(|(_, enabled)| **enabled)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Create every missing label from `label_names` with its taxonomy color.
///
/// Names absent from the color table are a programming-error condition.
pub async fn ensure_labels(
    mailbox: &dyn Mailbox,
    label_names: &[String],
) -> Result<(), TriageError> {
    let existing = mailbox.list_labels().await?;

    for name in label_names {
        if existing.iter().any(|l| &l.name == name) {
            continue;
        }
        let color = label_color(name)
            .ok_or_else(|| TriageError::UnknownLabel(name.clone()))?;
        mailbox.create_label(&NewLabel::colored(name, color)).await?;
        info!("Created label '{}'", name);
    }
    Ok(())
}

/// Resolve a user label by exact name (or `parent/name`), creating a
/// plain label if it does not exist. Returns the label id.
pub async fn get_or_create_label(
    mailbox: &dyn Mailbox,
    label_name: &str,
    parent_name: Option<&str>,
) -> Result<String, TriageError> {
    let full_name = match parent_name {
        Some(parent) => format!("{}/{}", parent, label_name),
        None => label_name.to_string(),
    };

    let labels = mailbox.list_labels().await?;
    if let Some(label) = labels
        .iter()
        .find(|l| l.is_user_label() && l.name == full_name)
    {
        return Ok(label.id.clone());
    }

    let created = mailbox.create_label(&NewLabel::plain(&full_name)).await?;
    info!("Created label '{}' ({})", full_name, created.id);
    Ok(created.id)
}

/// Add `label_name` to the message's label set, never removing existing
/// labels. A name that resolves to no current label is a logged no-op.
pub async fn apply_label(
    mailbox: &dyn Mailbox,
    message_id: &str,
    label_name: &str,
) -> Result<(), TriageError> {
    let labels = mailbox.list_labels().await?;
    match labels.iter().find(|l| l.name == label_name) {
        Some(label) => {
            mailbox.add_labels(message_id, vec![label.id.clone()]).await?;
            info!("Added label '{}' to message {}", label_name, message_id);
        }
        None => {
            warn!(
                "Label '{}' not found, leaving message {} unlabeled",
                label_name, message_id
            );
        }
    }
    Ok(())
}
