pub mod handlers;
pub mod models;
pub mod routes;

use std::sync::Arc;

use crate::auth::{CredentialProvider, GmailCredential};
use crate::classifier::Classifier;
use crate::config::Settings;
use crate::gmail::GmailClient;
use crate::locks::AccountLocks;
use crate::store::AccountStore;

/// Shared state handed to every handler.
pub struct AppState {
    pub settings: Settings,
    pub store: Arc<AccountStore>,
    pub credentials: CredentialProvider,
    pub classifier: Classifier,
    pub http: reqwest::Client,
    pub locks: AccountLocks,
}

impl AppState {
    pub fn new(settings: Settings, store: Arc<AccountStore>, classifier: Classifier) -> Self {
        let http = reqwest::Client::new();
        let credentials =
            CredentialProvider::new(store.clone(), http.clone(), settings.oauth.clone());
        Self {
            settings,
            store,
            credentials,
            classifier,
            http,
            locks: AccountLocks::new(),
        }
    }

    /// Build a Gmail client bound to a resolved credential.
    pub fn mailbox_for(&self, credential: &GmailCredential) -> GmailClient {
        GmailClient::new(
            self.http.clone(),
            credential.access_token.clone(),
            self.settings.gmail.api_base.clone(),
        )
    }
}
