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

pub mod api;
pub mod app;
pub mod config;
pub mod error;

use clap::Parser;
use config::{ChatConfig, EmbedMode};
use error::AppError;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "chatbot-rs", about = "Streaming chat client for a job-based assistant service")]
pub struct Cli {
    /// Service base URL (defaults to $CHAT_AI_ASSISTANT_API_URL)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Bearer token (defaults to $CHAT_AI_TOKEN)
    #[arg(long)]
    pub token: Option<String>,

    /// Request timeout for job creation and history, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Extra request header, `Name: value` (repeatable)
    #[arg(long = "header", short = 'H', value_name = "NAME: VALUE")]
    pub headers: Vec<String>,

    /// Keep cookies across requests
    #[arg(long)]
    pub with_credentials: bool,

    /// Continue an existing conversation instead of starting a new one
    #[arg(long)]
    pub conversation_id: Option<String>,

    /// `with_history` or `without_history`
    #[arg(long, value_name = "MODE")]
    pub embed_mode: Option<EmbedMode>,

    /// Write tracing diagnostics to a file (enables logging when set)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<std::path::PathBuf>,

    /// Tracing filter directives (e.g. info,chatbot_rust=debug)
    #[arg(long, value_name = "FILTER")]
    pub log_filter: Option<String>,

    /// Append to --log-file instead of truncating on startup
    #[arg(long)]
    pub log_append: bool,

    /// Send this prompt, print the reply and exit. Starts a REPL when empty.
    pub prompt: Vec<String>,
}

impl Cli {
    /// Layer command-line overrides on top of the environment defaults.
    pub fn chat_config(&self) -> Result<ChatConfig, AppError> {
        let mut config = ChatConfig::from_env();
        if let Some(base_url) = &self.base_url {
            config.base_url.clone_from(base_url);
        }
        if self.token.is_some() {
            config.token.clone_from(&self.token);
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        for raw in &self.headers {
            let Some((name, value)) = raw.split_once(':') else {
                tracing::error!(header = %raw, "header must be `Name: value`");
                return Err(AppError::InvalidConfig);
            };
            config.headers.insert(name.trim().to_owned(), value.trim().to_owned());
        }
        config.with_credentials = self.with_credentials;
        if let Some(mode) = self.embed_mode {
            config.embed_mode = mode;
        }
        if config.base_url.trim().is_empty() {
            return Err(AppError::InvalidConfig);
        }
        Ok(config)
    }

    #[must_use]
    pub fn prompt_text(&self) -> Option<String> {
        let text = self.prompt.join(" ");
        (!text.trim().is_empty()).then_some(text)
    }
}
