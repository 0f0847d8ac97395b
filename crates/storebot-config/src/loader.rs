// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Lookup order (later wins): compiled defaults, `/etc/storebot/storebot.toml`,
//! `~/.config/storebot/storebot.toml`, `./storebot.toml`, then `STOREBOT_*`
//! environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::StorebotConfig;

/// Top-level sections that environment variables may target.
const ENV_SECTIONS: &[&str] = &[
    "server", "storage", "openai", "meta", "assistant", "dedup", "blob", "email",
];

pub(crate) const SYSTEM_CONFIG: &str = "/etc/storebot/storebot.toml";
pub(crate) const LOCAL_CONFIG: &str = "storebot.toml";

pub(crate) fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("storebot/storebot.toml"))
        .unwrap_or_default()
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<StorebotConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string over compiled defaults only.
pub fn load_config_from_str(toml_content: &str) -> Result<StorebotConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(StorebotConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<StorebotConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(StorebotConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for hierarchy loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(StorebotConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// `STOREBOT_META_APP_SECRET` maps to `meta.app_secret`, never `meta.app.secret`.
fn env_provider() -> Env {
    Env::prefixed("STOREBOT_").map(|key| map_env_key(key.as_str()).into())
}

/// Replaces the first `_` after a known section name with a dot.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
