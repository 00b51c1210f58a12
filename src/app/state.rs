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

use super::reveal::RevealScheduler;
use super::tool_calls::ToolCallMap;
use crate::api::wire::Conversation;
use crate::api::{ClientEvent, JobClient, TurnId};
use crate::config::EmbedMode;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Executing,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallInfo {
    pub tool: String,
    pub status: ToolCallStatus,
    /// Result payload; present exactly when the call completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: MessageRole,
    /// Revealed text so far.
    pub content: String,
    /// Human-readable progress ("Using translate_text...").
    pub status: Option<String>,
    pub tool_calls: Option<Vec<ToolCallInfo>>,
    pub pending_tool_calls: Option<Vec<ToolCallInfo>>,
    pub is_streaming: bool,
    pub animation_complete: bool,
    pub has_error: bool,
}

impl ChatMessage {
    #[must_use]
    pub fn user(text: &str) -> Self {
        Self::new(MessageRole::User, text.to_owned(), false)
    }

    /// Empty assistant entry for a turn that just started.
    #[must_use]
    pub fn assistant_placeholder() -> Self {
        Self::new(MessageRole::Assistant, String::new(), true)
    }

    fn new(role: MessageRole, content: String, is_streaming: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            status: None,
            tool_calls: None,
            pending_tool_calls: None,
            is_streaming,
            animation_complete: false,
            has_error: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppStatus {
    Ready,
    /// Job creation request in flight.
    Submitting,
    /// Event stream open, or its text still being revealed.
    Streaming,
    Error,
}

/// Turn-scoped state of the event interpreter and its stream.
#[derive(Debug)]
pub struct TurnState {
    pub id: TurnId,
    /// Assistant message this turn writes into.
    pub message_id: String,
    pub job_id: Option<String>,
    /// Last sequence id confirmed by the transport, for `Last-Event-ID`.
    pub last_event_id: Option<u64>,
    pub cancel: CancellationToken,
    /// A transport task is reading this turn's stream.
    pub connected: bool,
    /// `job.completed` or `job.failed` was processed.
    pub job_done: bool,
    /// Every character delivered for this turn, independent of the reveal.
    pub delivered: String,
    pub tool_calls: ToolCallMap,
}

impl TurnState {
    #[must_use]
    pub fn new(id: TurnId, message_id: String) -> Self {
        Self {
            id,
            message_id,
            job_id: None,
            last_event_id: None,
            cancel: CancellationToken::new(),
            connected: false,
            job_done: false,
            delivered: String::new(),
            tool_calls: ToolCallMap::default(),
        }
    }

    /// The stream dropped after a job id was issued and before the job concluded.
    #[must_use]
    pub fn is_resumable(&self) -> bool {
        self.job_id.is_some() && !self.job_done && !self.connected
    }
}

pub struct App {
    pub messages: Vec<ChatMessage>,
    pub conversation_id: String,
    pub status: AppStatus,
    pub turn: Option<TurnState>,
    /// Turn whose stream failed mid-way; `resume_stream` picks it up again.
    pub resumable: Option<TurnState>,
    pub reveal: RevealScheduler,
    pub embed_mode: EmbedMode,
    pub conversations: Vec<Conversation>,
    pub conversations_error: Option<String>,
    pub client: Option<Rc<JobClient>>,
    pub event_tx: mpsc::UnboundedSender<ClientEvent>,
    pub event_rx: mpsc::UnboundedReceiver<ClientEvent>,
    pub should_quit: bool,
    /// Most recent turn-level failure, surfaced as the process exit code.
    pub exit_error: Option<AppError>,
    next_turn: u64,
}

impl App {
    #[must_use]
    pub fn new(client: Option<Rc<JobClient>>, embed_mode: EmbedMode) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            messages: Vec::new(),
            conversation_id: uuid::Uuid::new_v4().to_string(),
            status: AppStatus::Ready,
            turn: None,
            resumable: None,
            reveal: RevealScheduler::new(),
            embed_mode,
            conversations: Vec::new(),
            conversations_error: None,
            client,
            event_tx,
            event_rx,
            should_quit: false,
            exit_error: None,
            next_turn: 0,
        }
    }

    /// Detached app for tests: no client, no history.
    #[must_use]
    pub fn test_default() -> Self {
        Self::new(None, EmbedMode::WithoutHistory)
    }

    /// A turn is in flight or its text is still being revealed.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.turn.is_some() || self.reveal.is_active()
    }

    #[must_use]
    pub fn message(&self, id: &str) -> Option<&ChatMessage> {
        self.messages.iter().rev().find(|m| m.id == id)
    }

    pub fn message_mut(&mut self, id: &str) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().rev().find(|m| m.id == id)
    }

    /// The current turn, if `id` is still the current turn.
    pub fn current_turn_mut(&mut self, id: TurnId) -> Option<&mut TurnState> {
        self.turn.as_mut().filter(|t| t.id == id)
    }

    pub(super) fn allocate_turn_id(&mut self) -> TurnId {
        self.next_turn += 1;
        TurnId(self.next_turn)
    }
}
