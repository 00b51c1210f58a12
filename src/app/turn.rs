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

use super::interpreter::{finalize_message, finalize_stopped, handle_client_event};
use super::{App, AppStatus, ChatMessage, MessageRole, TurnState};
use crate::api::ClientEvent;
use crate::api::transport::stream_job_events;
use tokio_util::sync::CancellationToken;

pub const NO_CLIENT_MESSAGE: &str = "No chat service configured";

/// Start a turn: append the user message and an empty assistant message,
/// then create the job and stream its events in the background.
///
/// Returns `false` when the text is blank or another turn is still running.
pub fn submit_input(app: &mut App, text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    if app.is_busy() {
        tracing::debug!("submission ignored, a turn is still in flight");
        return false;
    }

    let assistant = ChatMessage::assistant_placeholder();
    let message_id = assistant.id.clone();
    app.messages.push(ChatMessage::user(text));
    app.messages.push(assistant);
    app.resumable = None;
    app.exit_error = None;
    app.reveal.start(&message_id);

    let id = app.allocate_turn_id();
    let turn = TurnState::new(id, message_id);
    let cancel = turn.cancel.clone();
    app.turn = Some(turn);
    app.status = AppStatus::Submitting;
    tracing::info!(turn = %id, conversation_id = %app.conversation_id, "submitting turn");

    let Some(client) = app.client.clone() else {
        handle_client_event(app, ClientEvent::SubmitFailed {
            turn: id,
            message: NO_CLIENT_MESSAGE.to_owned(),
        });
        return true;
    };
    let tx = app.event_tx.clone();
    let conversation_id = app.conversation_id.clone();
    let text = text.to_owned();

    tokio::task::spawn_local(async move {
        let submitted = tokio::select! {
            () = cancel.cancelled() => return,
            submitted = client.submit(&text, &conversation_id) => submitted,
        };
        let job_id = match submitted {
            Ok(job_id) => job_id,
            Err(err) => {
                if !cancel.is_cancelled() {
                    let _ = tx.send(ClientEvent::SubmitFailed { turn: id, message: err.to_string() });
                }
                return;
            }
        };
        if tx.send(ClientEvent::JobSubmitted { turn: id, job_id: job_id.clone() }).is_err() {
            return;
        }
        let outcome = stream_job_events(&client, id, &job_id, None, &cancel, &tx).await;
        tracing::debug!(turn = %id, ?outcome, "stream task finished");
    });
    true
}

/// Abort the active turn and show everything delivered so far. No-op when
/// no turn is active.
pub fn stop_streaming(app: &mut App) {
    let Some(turn) = app.turn.as_ref() else {
        tracing::debug!("stop requested with no active turn");
        return;
    };
    tracing::info!(turn = %turn.id, "stopping turn");
    turn.cancel.cancel();
    let message_id = turn.message_id.clone();

    match app.reveal.cancel() {
        Some((revealing, content)) => {
            if let Some(message) = app.message_mut(&revealing) {
                message.content = content;
            }
            finalize_stopped(app);
        }
        None => finalize_message(app, &message_id),
    }
}

/// Resubmit the most recent user message. The message, any errored assistant
/// replies after it and a reply still in flight are removed first, so the
/// transcript does not show it twice. No-op without a user message.
pub fn retry(app: &mut App) -> bool {
    let Some(index) = app.messages.iter().rposition(|m| m.role == MessageRole::User) else {
        tracing::debug!("retry requested with no user message");
        return false;
    };
    let abandoned = abandon_turn(app);

    let user = app.messages.remove(index);
    let mut position = 0;
    app.messages.retain(|m| {
        let dropped = m.has_error || abandoned.as_deref() == Some(m.id.as_str());
        let trailing = position >= index && m.role == MessageRole::Assistant && dropped;
        position += 1;
        !trailing
    });
    tracing::info!(message_id = %user.id, "retrying last user message");
    submit_input(app, &user.content)
}

/// Reopen the event stream of a turn whose connection failed, continuing
/// after the last confirmed event. Text delivered before the failure stays
/// visible.
pub fn resume_stream(app: &mut App) -> bool {
    if app.is_busy() {
        return false;
    }
    let Some(client) = app.client.clone() else {
        return false;
    };
    let Some(mut turn) = app.resumable.take() else {
        tracing::debug!("nothing to resume");
        return false;
    };
    let Some(job_id) = turn.job_id.clone() else {
        return false;
    };

    let id = app.allocate_turn_id();
    turn.id = id;
    turn.cancel = CancellationToken::new();
    turn.connected = true;
    let cancel = turn.cancel.clone();
    let last_event_id = turn.last_event_id;

    if let Some(message) = app.message_mut(&turn.message_id) {
        message.content.clone_from(&turn.delivered);
        message.has_error = false;
        message.is_streaming = true;
        message.animation_complete = false;
    }
    app.reveal.resume(&turn.message_id, &turn.delivered);
    tracing::info!(turn = %id, %job_id, ?last_event_id, "resuming event stream");
    app.turn = Some(turn);
    app.status = AppStatus::Streaming;
    app.exit_error = None;

    let tx = app.event_tx.clone();
    tokio::task::spawn_local(async move {
        let outcome = stream_job_events(&client, id, &job_id, last_event_id, &cancel, &tx).await;
        tracing::debug!(turn = %id, ?outcome, "resumed stream task finished");
    });
    true
}

/// Drop the transcript and start a fresh conversation id.
pub fn new_conversation(app: &mut App) {
    abandon_turn(app);
    app.messages.clear();
    app.conversation_id = uuid::Uuid::new_v4().to_string();
    app.exit_error = None;
    tracing::info!(conversation_id = %app.conversation_id, "new conversation");
}

/// Cancel the in-flight turn without finalizing it; its late events are
/// dropped as stale. Returns the assistant message it was writing, which the
/// caller must remove.
fn abandon_turn(app: &mut App) -> Option<String> {
    let mut abandoned = app.reveal.active_message().map(str::to_owned);
    if let Some(turn) = app.turn.take() {
        tracing::debug!(turn = %turn.id, "abandoning turn");
        turn.cancel.cancel();
        abandoned = Some(turn.message_id);
    }
    app.resumable = None;
    app.reveal.clear();
    app.status = AppStatus::Ready;
    abandoned
}
