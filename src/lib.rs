//! TradeChat web front end
//!
//! A server-rendered chat UI over a remote trading-assistant API. The
//! browser stays thin: pages and fragments are rendered here, and the
//! assistant's streamed reply is decoded server-side and pushed to the
//! page as rendered-HTML patches over SSE.
//!
//! # Modules
//!
//! - [`stream`]: incremental decoder for the assistant's block stream
//! - [`chat`]: per-user turn state machine and transcript
//! - [`api`]: typed client for the remote assistant API
//! - [`session`]: cookie-backed web sessions
//! - [`server`]: routes and the SSE patch bridge

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod forms;
pub mod markdown;
pub mod server;
pub mod session;
pub mod stream;
pub mod ui;

use std::sync::Arc;

use crate::api::{ApiClient, ClientConfig};
use crate::config::AppConfig;
use crate::session::WebSessionStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Unauthenticated client for the credential-exchange endpoints.
    pub auth_api: ApiClient,
    /// Live web sessions keyed by cookie value.
    pub sessions: WebSessionStore,
    /// Global configuration.
    pub config: Arc<AppConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            auth_api: ApiClient::new(ClientConfig::anonymous(config.api.base_url.clone())),
            sessions: WebSessionStore::new(),
            config,
        }
    }
}
