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

use super::App;
use crate::api::ClientEvent;
use crate::error::ApiError;

pub const LOAD_FAILED_MESSAGE: &str = "Failed to load conversations";

/// Fetch the conversation list in the background. Only the history-enabled
/// embed mode shows it, so other modes skip the request.
pub fn refresh_conversations(app: &mut App) -> bool {
    if !app.embed_mode.shows_history() {
        tracing::debug!(embed_mode = ?app.embed_mode, "history hidden, not loading conversations");
        return false;
    }
    let Some(client) = app.client.clone() else {
        return false;
    };
    let tx = app.event_tx.clone();
    tokio::task::spawn_local(async move {
        let event = match client.list_conversations().await {
            Ok(conversations) => ClientEvent::ConversationsListed(conversations),
            Err(err) => {
                tracing::error!("conversation listing failed: {err}");
                ClientEvent::ConversationsFailed(failure_message(&err))
            }
        };
        let _ = tx.send(event);
    });
    true
}

/// The server's `detail` when it sent one, a generic message otherwise.
#[must_use]
pub fn failure_message(err: &ApiError) -> String {
    err.detail().unwrap_or(LOAD_FAILED_MESSAGE).to_owned()
}
