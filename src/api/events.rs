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

use crate::api::wire::{Conversation, JobEvent};

/// Identifies one user turn. Background work tags every message with the turn
/// it was started for so late arrivals from an abandoned turn can be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(pub u64);

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "turn-{}", self.0)
    }
}

/// Messages sent from background network tasks to the state owner.
#[derive(Debug)]
pub enum ClientEvent {
    /// Job creation succeeded; the event stream is being opened.
    JobSubmitted { turn: TurnId, job_id: String },
    /// Job creation failed (non-2xx or network error).
    SubmitFailed { turn: TurnId, message: String },
    /// One decoded stream event. `last_event_id` is the transport's cursor
    /// after the record that carried it.
    Job { turn: TurnId, last_event_id: Option<u64>, event: JobEvent },
    /// Byte stream closed without a terminal event.
    StreamEnded { turn: TurnId, last_event_id: Option<u64> },
    /// Opening or reading the stream failed.
    StreamFailed { turn: TurnId, last_event_id: Option<u64>, message: String },
    /// Conversation history fetched.
    ConversationsListed(Vec<Conversation>),
    /// Conversation history could not be fetched.
    ConversationsFailed(String),
    /// User asked to stop the active turn.
    StopRequested,
}
