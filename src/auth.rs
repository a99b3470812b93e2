//! Credential resolution: stored token pair -> valid, non-expired credential.

use std::sync::Arc;

use log::{debug, error, info};
use serde::Deserialize;

use crate::config::{OAuthConfig, GMAIL_SCOPES};
use crate::error::TriageError;
use crate::store::AccountStore;

/// Consider a token expired this many seconds before its actual expiry,
/// so an in-flight mailbox call never races the deadline.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// A resolved, usable Gmail credential.
#[derive(Debug, Clone)]
pub struct GmailCredential {
    pub account_email: String,
    pub access_token: String,
}

/// Token response from the OAuth2 token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
    /// The refresh token may rotate; absent means keep the old one.
    refresh_token: Option<String>,
}

/// Resolves a user's stored access/refresh token pair into a valid
/// credential, refreshing (and persisting) if expired.
pub struct CredentialProvider {
    store: Arc<AccountStore>,
    http: reqwest::Client,
    oauth: OAuthConfig,
}

impl CredentialProvider {
    pub fn new(store: Arc<AccountStore>, http: reqwest::Client, oauth: OAuthConfig) -> Self {
        Self { store, http, oauth }
    }

    /// Look up the account's credential record and return a non-expired
    /// access token. Fails `NotFound` if the account or credential record
    /// is absent, or if a required refresh fails.
    pub async fn resolve(&self, account_email: &str) -> Result<GmailCredential, TriageError> {
        let user = self
            .store
            .find_user(account_email)
            .await?
            .ok_or_else(|| TriageError::NotFound(format!("user {}", account_email)))?;

        let cred = self
            .store
            .find_credentials(&user.email)
            .await?
            .ok_or_else(|| TriageError::NotFound(format!("credentials for {}", account_email)))?;

        let now = chrono::Utc::now().timestamp();
        if cred.expires_at - EXPIRY_MARGIN_SECS > now {
            return Ok(GmailCredential {
                account_email: user.email,
                access_token: cred.access_token,
            });
        }

        debug!("Access token expired for {}, refreshing", account_email);
        match self.refresh(&cred.refresh_token).await {
            Ok(token) => {
                let refresh_token = token
                    .refresh_token
                    .as_deref()
                    .unwrap_or(&cred.refresh_token);
                let expires_at = now + token.expires_in as i64;
                self.store
                    .update_credentials(&user.email, &token.access_token, refresh_token, expires_at)
                    .await?;
                info!("Refreshed access token for {}", account_email);
                Ok(GmailCredential {
                    account_email: user.email,
                    access_token: token.access_token,
                })
            }
            Err(e) => {
                // Refresh failure is absorbed: the caller sees the same
                // outcome as a missing credential record. No retry.
                error!("Token refresh failed for {}: {}", account_email, e);
                Err(TriageError::NotFound(format!(
                    "credentials for {}",
                    account_email
                )))
            }
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, TriageError> {
        let scopes = GMAIL_SCOPES.join(" ");
        let params = [
            ("client_id", self.oauth.client_id.as_str()),
            ("client_secret", self.oauth.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
            ("scope", scopes.as_str()),
        ];

        let response = self
            .http
            .post(&self.oauth.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TriageError::InternalError(format!(
                "token refresh failed: HTTP {}: {}",
                status, body
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(TriageError::from)
    }
}
