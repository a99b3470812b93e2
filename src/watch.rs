//! Watch Manager: start/stop the Gmail push-notification subscription.

use log::info;

use crate::error::TriageError;
use crate::gmail::Mailbox;
use crate::store::AccountStore;

/// Register or deregister inbox push notifications, then persist the
/// flag. The flag is upserted whenever the provider call succeeds, even
/// though the provider's side effect cannot be confirmed beyond that.
pub async fn set_watch(
    store: &AccountStore,
    mailbox: &dyn Mailbox,
    topic_name: &str,
    account_email: &str,
    enabled: bool,
) -> Result<(), TriageError> {
    if enabled {
        let response = mailbox.watch(topic_name).await?;
        info!(
            "Started Gmail watch for {} (history_id={:?})",
            account_email, response.history_id
        );
    } else {
        mailbox.stop_watch().await?;
        info!("Stopped Gmail watch for {}", account_email);
    }

    store.set_watch_flag(account_email, enabled).await?;
    Ok(())
}
