use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs as async_fs;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Account not found: {0}")]
    NotFound(String),
}

/// One registered end-user of the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub email: String,
    /// Enabled taxonomy category names, in taxonomy order.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Whether the Gmail push-notification watch is active.
    #[serde(default)]
    pub watch_enabled: bool,
    /// Last-seen Gmail history checkpoint.
    #[serde(default)]
    pub history_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
            labels: Vec::new(),
            watch_enabled: false,
            history_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

/// OAuth token pair linked 1:1 to a user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub account_email: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds) when the access token expires.
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    users: Vec<UserRecord>,
    #[serde(default)]
    credentials: Vec<CredentialRecord>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            version: default_version(),
            users: Vec::new(),
            credentials: Vec::new(),
        }
    }
}

/// JSON-file backed document store for user and credential records.
///
/// All updates are full-document read-modify-write with an atomic
/// temp-file rename; fields are last-writer-wins.
pub struct AccountStore {
    path: PathBuf,
}

impl AccountStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create the backing file (and parent directories) if missing.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        if !self.path.exists() {
            info!("Creating new triage store at: {:?}", self.path);
            if let Some(parent) = self.path.parent() {
                async_fs::create_dir_all(parent).await?;
            }
            // Token material lives here; save keeps the file owner-only.
            self.save(&StoreDocument::default()).await?;
        }
        Ok(())
    }

    async fn load(&self) -> Result<StoreDocument, StoreError> {
        debug!("Loading triage store from: {:?}", self.path);
        let contents = async_fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&contents)?)
    }

    async fn save(&self, doc: &StoreDocument) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(doc)?;
        let temp_path = self.path.with_extension("tmp");
        async_fs::write(&temp_path, json.as_bytes()).await?;

        // The rename replaces the store with the temp file, so the
        // owner-only mode must be set here or it is lost on every write.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = async_fs::metadata(&temp_path).await?;
            let mut permissions = metadata.permissions();
            permissions.set_mode(0o600);
            async_fs::set_permissions(&temp_path, permissions).await?;
        }

        async_fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    /// Get a user record, failing if absent.
    pub async fn get_user(&self, email: &str) -> Result<UserRecord, StoreError> {
        self.find_user(email)
            .await?
            .ok_or_else(|| StoreError::NotFound(email.to_string()))
    }

    pub async fn find_user(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let doc = self.load().await?;
        Ok(doc.users.into_iter().find(|u| u.email == email))
    }

    async fn upsert_user<F>(&self, email: &str, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut UserRecord),
    {
        let mut doc = self.load().await?;
        let idx = match doc.users.iter().position(|u| u.email == email) {
            Some(idx) => idx,
            None => {
                doc.users.push(UserRecord::new(email));
                doc.users.len() - 1
            }
        };
        mutate(&mut doc.users[idx]);
        doc.users[idx].updated_at = Utc::now();
        self.save(&doc).await
    }

    /// Replace the enabled taxonomy selection, creating the user if unseen.
    pub async fn set_user_labels(&self, email: &str, labels: Vec<String>) -> Result<(), StoreError> {
        self.upsert_user(email, |u| u.labels = labels).await
    }

    /// Persist the watch on/off flag, creating the user if unseen.
    pub async fn set_watch_flag(&self, email: &str, enabled: bool) -> Result<(), StoreError> {
        self.upsert_user(email, |u| u.watch_enabled = enabled).await
    }

    /// Persist the history checkpoint, creating the user if unseen.
    pub async fn set_history_id(&self, email: &str, history_id: &str) -> Result<(), StoreError> {
        self.upsert_user(email, |u| u.history_id = Some(history_id.to_string()))
            .await
    }

    /// Remove a user record and its linked credential record.
    pub async fn delete_account(&self, email: &str) -> Result<(), StoreError> {
        let mut doc = self.load().await?;
        let initial = doc.users.len();
        doc.users.retain(|u| u.email != email);
        if doc.users.len() == initial {
            return Err(StoreError::NotFound(email.to_string()));
        }
        doc.credentials.retain(|c| c.account_email != email);
        self.save(&doc).await?;
        info!("Deleted account and credentials for {}", email);
        Ok(())
    }

    pub async fn find_credentials(
        &self,
        email: &str,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        let doc = self.load().await?;
        Ok(doc
            .credentials
            .into_iter()
            .find(|c| c.account_email == email))
    }

    /// Write back a (possibly rotated) token pair after a refresh.
    pub async fn update_credentials(
        &self,
        email: &str,
        access_token: &str,
        refresh_token: &str,
        expires_at: i64,
    ) -> Result<(), StoreError> {
        let mut doc = self.load().await?;
        match doc
            .credentials
            .iter_mut()
            .find(|c| c.account_email == email)
        {
            Some(cred) => {
                cred.access_token = access_token.to_string();
                cred.refresh_token = refresh_token.to_string();
                cred.expires_at = expires_at;
            }
            None => doc.credentials.push(CredentialRecord {
                account_email: email.to_string(),
                access_token: access_token.to_string(),
                refresh_token: refresh_token.to_string(),
                expires_at,
            }),
        }
        self.save(&doc).await
    }
}
