use config::{Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OAuth2 scopes requested for Gmail access.
pub const GMAIL_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/gmail.labels",
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
    "https://mail.google.com/",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by the CORS layer.
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the JSON document holding user and credential records.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmailConfig {
    /// Base URL of the Gmail REST API.
    pub api_base: String,
    /// Pub/Sub topic that `users.watch` publishes notifications to.
    pub topic_name: String,
}

/// What to do with a classifier answer that is not one of the candidates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierPolicy {
    /// Use the model output verbatim.
    Trust,
    /// Fall back to the catch-all category on a non-candidate answer.
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub policy: ClassifierPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub log: LogConfig,
    pub store: StoreConfig,
    pub oauth: OAuthConfig,
    pub gmail: GmailConfig,
    pub openai: OpenAiConfig,
}

impl Settings {
    /// Load settings from defaults, an optional TOML file and
    /// `MAILTRIAGE_*` environment variables (e.g. `MAILTRIAGE_SERVER_PORT`).
    pub fn new(config_path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8000)?
            .set_default(
                "server.cors_origins",
                vec!["http://localhost:3000", "http://localhost:8000"],
            )?
            .set_default("log.level", "info")?
            .set_default("store.path", "data/triage_store.json")?
            .set_default("oauth.token_uri", "https://oauth2.googleapis.com/token")?
            .set_default("oauth.client_id", "")?
            .set_default("oauth.client_secret", "")?
            .set_default("gmail.api_base", "https://gmail.googleapis.com")?
            .set_default("gmail.topic_name", "")?
            .set_default("openai.api_key", "")?
            .set_default("openai.model", "gpt-3.5-turbo")?
            .set_default("openai.policy", "trust")?;

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("MAILTRIAGE")
                .separator("_")
                .ignore_empty(true),
        );

        builder.build()?.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        // Defaults alone always satisfy the schema.
        Settings::new(None).expect("default settings must deserialize")
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load or parse configuration: {0}")]
    LoadError(#[from] config::ConfigError),
}
