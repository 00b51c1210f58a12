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

//! Applies background messages to the transcript: one state transition per
//! job event, plus the bookkeeping for submission and stream outcomes.

use super::reveal::{RevealScheduler, Tick};
use super::tool_calls::{DEFAULT_REQUESTED_TOOL, ToolCallMap};
use super::{App, AppStatus, ChatMessage, TurnState};
use crate::api::wire::JobEvent;
use crate::api::{ClientEvent, TurnId};
use crate::error::AppError;
use std::time::Instant;

pub const DEFAULT_PAUSE_REASON: &str = "Paused for tool execution";

pub fn handle_client_event(app: &mut App, event: ClientEvent) {
    match event {
        ClientEvent::JobSubmitted { turn, job_id } => handle_job_submitted(app, turn, job_id),
        ClientEvent::SubmitFailed { turn, message } => handle_submit_failed(app, turn, &message),
        ClientEvent::Job { turn, last_event_id, event } => {
            if let Some(seq) = last_event_id
                && let Some(state) = app.current_turn_mut(turn)
            {
                state.last_event_id = Some(seq);
            }
            handle_job_event(app, turn, event);
        }
        ClientEvent::StreamEnded { turn, last_event_id } => {
            handle_stream_closed(app, turn, last_event_id, None);
        }
        ClientEvent::StreamFailed { turn, last_event_id, message } => {
            handle_stream_closed(app, turn, last_event_id, Some(&message));
        }
        ClientEvent::ConversationsListed(conversations) => {
            tracing::debug!(count = conversations.len(), "conversation history loaded");
            app.conversations = conversations;
            app.conversations_error = None;
        }
        ClientEvent::ConversationsFailed(message) => {
            tracing::warn!("conversation history unavailable: {message}");
            app.conversations_error = Some(message);
        }
        ClientEvent::StopRequested => super::turn::stop_streaming(app),
    }
}

/// Advance the reveal by one tick, write the visible prefix into the
/// transcript and finalize the message if the reveal just stopped.
pub fn reveal_tick(app: &mut App, now: Instant) {
    if let Tick::Revealed { message_id, content } = app.reveal.tick(now)
        && let Some(message) = app.message_mut(&message_id)
    {
        message.content = content;
    }
    finalize_stopped(app);
}

/// Finalize the message whose reveal stopped, if any. Runs at most once per
/// stopped reveal.
pub(super) fn finalize_stopped(app: &mut App) {
    if let Some(message_id) = app.reveal.take_stopped() {
        finalize_message(app, &message_id);
    }
}

fn is_stale(app: &App, turn: TurnId) -> bool {
    let stale = app.turn.as_ref().is_none_or(|t| t.id != turn);
    if stale {
        tracing::debug!(%turn, "dropping message for a turn that is no longer current");
    }
    stale
}

/// Split borrow of the current turn and the message it writes into.
fn turn_and_message(app: &mut App, turn: TurnId) -> Option<(&mut TurnState, &mut ChatMessage)> {
    let App { turn: current, messages, .. } = app;
    let state = current.as_mut().filter(|t| t.id == turn)?;
    let message = messages.iter_mut().rev().find(|m| m.id == state.message_id)?;
    Some((state, message))
}

fn handle_job_submitted(app: &mut App, turn: TurnId, job_id: String) {
    let Some(state) = app.current_turn_mut(turn) else {
        tracing::debug!(%turn, %job_id, "job created for an abandoned turn");
        return;
    };
    tracing::info!(%turn, %job_id, "job accepted, streaming events");
    state.job_id = Some(job_id);
    state.connected = true;
    app.status = AppStatus::Streaming;
}

fn handle_submit_failed(app: &mut App, turn: TurnId, error: &str) {
    if is_stale(app, turn) {
        return;
    }
    let Some((_, message)) = turn_and_message(app, turn) else {
        return;
    };
    tracing::error!(%turn, "job submission failed: {error}");
    message.has_error = true;
    message.is_streaming = false;
    app.exit_error = Some(AppError::SubmissionFailed);
    // Nothing was delivered yet, so stopping the reveal loses no text.
    app.reveal.cancel();
    finalize_stopped(app);
}

fn handle_job_event(app: &mut App, turn: TurnId, event: JobEvent) {
    if is_stale(app, turn) {
        return;
    }
    let App { turn: current, messages, reveal, exit_error, .. } = app;
    let Some(state) = current.as_mut() else {
        return;
    };
    if state.job_done {
        tracing::debug!(%turn, "ignoring event after job conclusion");
        return;
    }
    let Some(message) = messages.iter_mut().rev().find(|m| m.id == state.message_id) else {
        tracing::warn!(%turn, message_id = %state.message_id, "turn message missing from transcript");
        return;
    };
    let cancelled = state.cancel.is_cancelled();

    match event {
        JobEvent::Started => tracing::info!(%turn, "job started"),
        JobEvent::AgentDelta(delta) => {
            if delta.text.is_empty() {
                return;
            }
            state.delivered.push_str(&delta.text);
            if !cancelled {
                reveal.extend(&delta.text);
            }
        }
        JobEvent::AgentMessage(full) => {
            if full.content.is_empty() || !state.delivered.is_empty() {
                tracing::debug!(%turn, "full message ignored, deltas already delivered");
                return;
            }
            state.delivered = full.content;
            if !cancelled {
                reveal.replace(&state.delivered);
            }
        }
        JobEvent::ToolRequested(request) => {
            let tool = request.name.unwrap_or_else(|| DEFAULT_REQUESTED_TOOL.to_owned());
            let call_id = request.call_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            tracing::info!(%turn, %call_id, %tool, "tool requested");
            state.tool_calls.request(&call_id, &tool);
            message.pending_tool_calls = non_empty(state.tool_calls.pending());
            message.status = Some(using_status(&tool));
        }
        JobEvent::ToolCompleted(done) => {
            let Some(call_id) = done.call_id else {
                tracing::warn!(%turn, "tool.completed without call_id ignored");
                return;
            };
            let result = done.result.unwrap_or_else(|| serde_json::json!({}));
            tracing::info!(%turn, %call_id, "tool completed");
            state.tool_calls.complete(&call_id, done.tool_name.as_deref(), result);
            sync_tool_calls(message, &state.tool_calls);
        }
        JobEvent::Paused(change) => {
            message.status = Some(change.reason.unwrap_or_else(|| DEFAULT_PAUSE_REASON.to_owned()));
        }
        JobEvent::Resumed(_) => message.status = None,
        JobEvent::Completed => {
            tracing::info!(%turn, chars = state.delivered.chars().count(), "job completed");
            state.job_done = true;
            message.is_streaming = false;
            sync_tool_calls(message, &state.tool_calls);
            message.status = None;
            reveal.mark_complete();
        }
        JobEvent::Failed(failure) => {
            let error = failure.message();
            tracing::error!(%turn, "job failed: {error}");
            state.job_done = true;
            let content = if state.delivered.is_empty() {
                error.to_owned()
            } else {
                state.delivered.clone()
            };
            force_flush(reveal, &content);
            message.content = content;
            message.is_streaming = false;
            message.has_error = true;
            message.status = None;
            *exit_error = Some(AppError::JobFailed);
        }
        JobEvent::Unknown { event } => {
            tracing::warn!(%turn, event = event.as_deref().unwrap_or(""), "ignoring unknown event type");
        }
    }
}

/// Show `content` in full and let the reveal stop on its next tick.
fn force_flush(reveal: &mut RevealScheduler, content: &str) {
    reveal.replace(content);
    reveal.flush();
    reveal.mark_complete();
}

fn handle_stream_closed(
    app: &mut App,
    turn: TurnId,
    last_event_id: Option<u64>,
    failure: Option<&str>,
) {
    if is_stale(app, turn) {
        return;
    }
    let Some((state, message)) = turn_and_message(app, turn) else {
        return;
    };
    state.connected = false;
    if let Some(seq) = last_event_id {
        state.last_event_id = Some(seq);
    }
    if state.job_done {
        return;
    }
    message.is_streaming = false;
    match failure {
        None => {
            tracing::info!(%turn, "stream closed before the job concluded, finishing reveal");
        }
        Some(error) => {
            tracing::error!(%turn, last_event_id = ?state.last_event_id, "stream failed: {error}");
            message.has_error = true;
            app.exit_error = Some(AppError::StreamFailed);
        }
    }
    app.reveal.mark_complete();
}

/// Both the job and the reveal are done: settle the message and release the turn.
pub(super) fn finalize_message(app: &mut App, message_id: &str) {
    let owned = app.turn.as_ref().is_some_and(|t| t.message_id == message_id);
    let turn = if owned { app.turn.take() } else { None };

    let mut has_error = false;
    if let Some(message) = app.message_mut(message_id) {
        message.is_streaming = false;
        message.animation_complete = true;
        if let Some(turn) = turn.as_ref().filter(|t| !t.tool_calls.is_empty()) {
            sync_tool_calls(message, &turn.tool_calls);
        }
        message.status = None;
        has_error = message.has_error;
        tracing::debug!(%message_id, has_error, "message finalized");
    }

    if let Some(turn) = turn {
        if has_error && turn.is_resumable() {
            tracing::info!(turn = %turn.id, last_event_id = ?turn.last_event_id, "turn can be resumed");
            app.resumable = Some(turn);
        } else {
            turn.cancel.cancel();
        }
    }
    if app.turn.is_none() {
        app.status = if has_error { AppStatus::Error } else { AppStatus::Ready };
    }
}

/// Rebuild the message's tool lists from the call map. Completed calls
/// replace the message's list only when there are any.
fn sync_tool_calls(message: &mut ChatMessage, calls: &ToolCallMap) {
    let pending = calls.pending();
    message.status = pending.first().map(|c| using_status(&c.tool));
    message.pending_tool_calls = non_empty(pending);
    if let Some(completed) = non_empty(calls.completed()) {
        message.tool_calls = Some(completed);
    }
}

fn using_status(tool: &str) -> String {
    format!("Using {tool}...")
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}
