// Chatbot Rust - A streaming chat client core in Rust
// Copyright (C) 2025  Simon Peter Rothgang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Client configuration for the job service.
//!
//! Components take an explicit `Arc<ChatConfig>` at construction time. For
//! embedders that don't want to wire one through, a process-wide default is
//! built lazily from the environment on first use and can be replaced at any
//! time with [`initialize`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock, RwLock};
use std::time::Duration;

pub const BASE_URL_ENV: &str = "CHAT_AI_ASSISTANT_API_URL";
pub const TOKEN_ENV: &str = "CHAT_AI_TOKEN";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Whether the embedding UI shows the conversation history panel.
/// Has no effect on the streaming core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedMode {
    WithHistory,
    #[default]
    WithoutHistory,
}

impl EmbedMode {
    #[must_use]
    pub fn shows_history(self) -> bool {
        self == Self::WithHistory
    }
}

impl std::str::FromStr for EmbedMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "with_history" => Ok(Self::WithHistory),
            "without_history" => Ok(Self::WithoutHistory),
            other => Err(format!("unknown embed mode `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
    /// Extra headers sent with every request, after the defaults.
    pub headers: BTreeMap<String, String>,
    /// Keep cookies across requests (credentialed requests).
    pub with_credentials: bool,
    pub embed_mode: EmbedMode,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
            headers: BTreeMap::new(),
            with_credentials: false,
            embed_mode: EmbedMode::default(),
        }
    }
}

impl ChatConfig {
    /// Defaults with base URL and token taken from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults with base URL and token resolved through `lookup`.
    /// Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            base_url: non_empty(BASE_URL_ENV).unwrap_or_default(),
            token: non_empty(TOKEN_ENV),
            ..Self::default()
        }
    }

    /// Join `path` onto the base URL, tolerating a trailing slash on the base.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }
}

static GLOBAL: LazyLock<RwLock<Arc<ChatConfig>>> =
    LazyLock::new(|| RwLock::new(Arc::new(ChatConfig::from_env())));

/// Replace the process-wide default configuration.
pub fn initialize(config: ChatConfig) -> Arc<ChatConfig> {
    let config = Arc::new(config);
    match GLOBAL.write() {
        Ok(mut slot) => *slot = Arc::clone(&config),
        Err(poisoned) => *poisoned.into_inner() = Arc::clone(&config),
    }
    tracing::debug!(base_url = %config.base_url, "chat configuration replaced");
    config
}

/// The process-wide default configuration, created from the environment on first use.
#[must_use]
pub fn current() -> Arc<ChatConfig> {
    match GLOBAL.read() {
        Ok(slot) => Arc::clone(&slot),
        Err(poisoned) => Arc::clone(&poisoned.into_inner()),
    }
}
