//! Webhook-driven Gmail triage service.
//!
//! Watches a user's mailbox through a Pub/Sub push subscription,
//! classifies incoming messages into a small taxonomy with a
//! language-model call, and applies the matching label. Also exposes
//! on-demand sender-scoped labeling and bulk-delete operations plus
//! per-user label preference and watch management.

pub mod api;
pub mod auth;
pub mod classifier;
pub mod config;
pub mod error;
pub mod gmail;
pub mod history;
pub mod labels;
pub mod locks;
pub mod sender_ops;
pub mod store;
pub mod watch;
pub mod webhook;

// Test doubles, public so integration tests can use them.
pub mod testing;
