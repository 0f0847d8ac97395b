// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Storebot backend.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Storebot configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorebotConfig {
    /// HTTP listener and API authentication.
    #[serde(default)]
    pub server: ServerConfig,

    /// SQLite database settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// OpenAI-compatible generation and embedding API.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Meta Graph API (Messenger, Instagram, WhatsApp).
    #[serde(default)]
    pub meta: MetaConfig,

    /// Orchestration loop tuning.
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Webhook retry suppression.
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Blob storage used to re-host platform images.
    #[serde(default)]
    pub blob: BlobConfig,

    /// SMTP settings for order emails.
    #[serde(default)]
    pub email: EmailConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token required on authenticated routes. `None` rejects all of them.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable SQLite WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    "storebot.db".to_string()
}

fn default_true() -> bool {
    true
}

/// OpenAI-compatible API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiConfig {
    /// API key. `None` requires the `OPENAI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the API (without trailing slash).
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Chat model used for assistant turns.
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Model used to describe query images for similarity search.
    #[serde(default = "default_chat_model")]
    pub vision_model: String,

    /// Embedding model used for similarity search.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Maximum completion tokens per generation.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_openai_timeout")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base_url(),
            model: default_chat_model(),
            vision_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_openai_timeout(),
        }
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_openai_timeout() -> u64 {
    120
}

/// Meta Graph API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetaConfig {
    /// Versioned Graph API base URL.
    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: String,

    /// Secret echoed back during the webhook verification handshake.
    #[serde(default)]
    pub verify_token: Option<String>,

    /// App secret for `X-Hub-Signature-256` verification and OAuth exchange.
    #[serde(default)]
    pub app_secret: Option<String>,

    /// App id used for OAuth exchange.
    #[serde(default)]
    pub app_id: Option<String>,

    /// OAuth redirect URI registered with the app.
    #[serde(default)]
    pub redirect_url: Option<String>,

    /// Where to send the browser after a successful channel connection.
    #[serde(default)]
    pub success_redirect_url: Option<String>,

    /// Where to send the browser after a failed channel connection.
    #[serde(default)]
    pub error_redirect_url: Option<String>,

    /// URL fragments identifying images hosted on the platform CDN.
    #[serde(default = "default_cdn_markers")]
    pub cdn_markers: Vec<String>,

    /// Refresh page tokens expiring within this many seconds.
    #[serde(default = "default_refresh_buffer")]
    pub token_refresh_buffer_secs: u64,

    /// Lifetime assumed for a freshly issued page token.
    #[serde(default = "default_token_lifetime_days")]
    pub token_lifetime_days: u32,

    /// Graph request timeout in seconds.
    #[serde(default = "default_graph_timeout")]
    pub timeout_secs: u64,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            graph_base_url: default_graph_base_url(),
            verify_token: None,
            app_secret: None,
            app_id: None,
            redirect_url: None,
            success_redirect_url: None,
            error_redirect_url: None,
            cdn_markers: default_cdn_markers(),
            token_refresh_buffer_secs: default_refresh_buffer(),
            token_lifetime_days: default_token_lifetime_days(),
            timeout_secs: default_graph_timeout(),
        }
    }
}

fn default_graph_base_url() -> String {
    "https://graph.facebook.com/v21.0".to_string()
}

fn default_cdn_markers() -> Vec<String> {
    vec!["fbcdn.net".to_string()]
}

fn default_refresh_buffer() -> u64 {
    24 * 60 * 60
}

fn default_token_lifetime_days() -> u32 {
    60
}

fn default_graph_timeout() -> u64 {
    30
}

/// Orchestration loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AssistantConfig {
    /// Number of prior transcript messages sent with each turn.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Delay between polls of an asynchronous run.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Hard upper bound on waiting for one run.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    /// How long a new turn waits for a superseded turn to release the thread.
    #[serde(default = "default_cancel_wait_secs")]
    pub cancel_wait_secs: u64,

    /// Maximum generate/tool rounds per turn.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,

    /// Reply sent when a turn fails.
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_timeout_secs: default_poll_timeout_secs(),
            cancel_wait_secs: default_cancel_wait_secs(),
            max_tool_rounds: default_max_tool_rounds(),
            fallback_reply: default_fallback_reply(),
        }
    }
}

fn default_history_limit() -> usize {
    20
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_poll_timeout_secs() -> u64 {
    120
}

fn default_cancel_wait_secs() -> u64 {
    5
}

fn default_max_tool_rounds() -> usize {
    8
}

fn default_fallback_reply() -> String {
    "there was a problem".to_string()
}

/// Webhook deduplication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DedupConfig {
    /// How long a processed (messageId, senderId) pair is remembered.
    #[serde(default = "default_dedup_ttl")]
    pub ttl_secs: u64,

    /// Sweep expired entries after this many insertions.
    #[serde(default = "default_sweep_every")]
    pub sweep_every: u64,

    /// Periodic sweep interval. `0` disables the timer.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_dedup_ttl(),
            sweep_every: default_sweep_every(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_dedup_ttl() -> u64 {
    60 * 60
}

fn default_sweep_every() -> u64 {
    100
}

fn default_sweep_interval() -> u64 {
    300
}

/// Blob storage configuration. Re-hosting is disabled unless both URLs are set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BlobConfig {
    /// Base URL objects are `PUT` to, e.g. `https://storage.example.com/bucket`.
    #[serde(default)]
    pub upload_base_url: Option<String>,

    /// Base URL objects are publicly served from.
    #[serde(default)]
    pub public_base_url: Option<String>,

    /// Bearer token for uploads.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Key prefix for re-hosted platform images.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            upload_base_url: None,
            public_base_url: None,
            bearer_token: None,
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_key_prefix() -> String {
    "facebook-images".to_string()
}

/// SMTP configuration for order emails. Sending is disabled without a host.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    #[serde(default)]
    pub smtp_host: Option<String>,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Sender address on order emails.
    #[serde(default)]
    pub from_address: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            username: None,
            password: None,
            from_address: None,
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}
