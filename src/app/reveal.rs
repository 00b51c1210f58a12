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

//! Paced character reveal for the in-flight assistant message.
//!
//! The scheduler owns the hot state (target buffer, cursor, timing) and is
//! advanced by an external fixed-rate tick. The transcript only sees the
//! result of a tick, never the per-frame bookkeeping.

use std::time::{Duration, Instant};

/// Minimum spacing between two reveal steps.
pub const FRAME_DELAY: Duration = Duration::from_millis(15);
/// Characters exposed per step.
pub const CHARS_PER_FRAME: usize = 2;

/// Result of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// No message is being revealed.
    Idle,
    /// Nothing new to show this tick (frame delay not reached, or caught up
    /// while the buffer may still grow).
    Waiting,
    /// The visible prefix of `message_id` grew to `content`.
    Revealed { message_id: String, content: String },
    /// Caught up with a buffer that will not grow anymore. The scheduler has
    /// reset itself; the turn can be finalized.
    Finished { message_id: String },
}

#[derive(Debug, Default)]
pub struct RevealScheduler {
    /// Message currently being revealed.
    active: Option<String>,
    /// Last message that stopped revealing and hasn't been finalized yet.
    previous: Option<String>,
    /// Server-confirmed text of the active message.
    target: String,
    /// Byte offset of the revealed prefix (always on a char boundary).
    cursor: usize,
    /// No further growth of `target` will occur.
    complete: bool,
    /// Time of the last step; `None` until the first tick of a run.
    last_step: Option<Instant>,
}

impl RevealScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin revealing a new message from an empty buffer.
    pub fn start(&mut self, message_id: &str) {
        self.reset_buffer();
        self.active = Some(message_id.to_owned());
    }

    /// Continue revealing `message_id` with `delivered` already visible.
    pub fn resume(&mut self, message_id: &str, delivered: &str) {
        self.start(message_id);
        self.target.push_str(delivered);
        self.cursor = self.target.len();
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    #[must_use]
    pub fn active_message(&self) -> Option<&str> {
        self.active.as_deref()
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[must_use]
    pub fn revealed(&self) -> &str {
        self.target.get(..self.cursor).unwrap_or("")
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn extend(&mut self, text: &str) {
        if self.active.is_some() {
            self.target.push_str(text);
        }
    }

    /// Replace the whole buffer. Used when a full message arrives with no
    /// deltas before it; a shorter replacement restarts the reveal.
    pub fn replace(&mut self, text: &str) {
        if self.active.is_some() {
            self.target.clear();
            self.target.push_str(text);
        }
    }

    /// The buffer will not grow anymore.
    pub fn mark_complete(&mut self) {
        if self.active.is_some() {
            self.complete = true;
        }
    }

    /// Jump the cursor to the end of the buffer and return the full text.
    pub fn flush(&mut self) -> Option<&str> {
        self.active.as_ref()?;
        self.cursor = self.target.len();
        Some(&self.target)
    }

    pub fn tick(&mut self, now: Instant) -> Tick {
        let Some(message_id) = self.active.clone() else {
            return Tick::Idle;
        };

        if self.target.len() < self.cursor || !self.target.is_char_boundary(self.cursor) {
            tracing::debug!(%message_id, "reveal buffer shrank, restarting from the beginning");
            self.cursor = 0;
            self.last_step = None;
        }

        let last = *self.last_step.get_or_insert(now);
        if self.cursor < self.target.len() && now.saturating_duration_since(last) >= FRAME_DELAY {
            self.cursor = advance_chars(&self.target, self.cursor, CHARS_PER_FRAME);
            self.last_step = Some(now);
            return Tick::Revealed { message_id, content: self.revealed().to_owned() };
        }

        if self.cursor < self.target.len() || !self.complete {
            return Tick::Waiting;
        }

        tracing::debug!(%message_id, chars = self.target.chars().count(), "reveal finished");
        self.stop();
        Tick::Finished { message_id }
    }

    /// Stop immediately. Returns the active message id and its full buffered
    /// text so the caller can show everything that was delivered.
    pub fn cancel(&mut self) -> Option<(String, String)> {
        let message_id = self.active.clone()?;
        let content = std::mem::take(&mut self.target);
        self.stop();
        Some((message_id, content))
    }

    /// Take the id of the message that stopped revealing. Yields each stopped
    /// message once, so finalization runs exactly once per turn.
    pub fn take_stopped(&mut self) -> Option<String> {
        if self.active.is_some() {
            return None;
        }
        self.previous.take()
    }

    /// Drop all state without marking anything for finalization.
    pub fn clear(&mut self) {
        self.reset_buffer();
        self.active = None;
        self.previous = None;
    }

    fn stop(&mut self) {
        self.previous = self.active.take();
        self.reset_buffer();
    }

    fn reset_buffer(&mut self) {
        self.target.clear();
        self.cursor = 0;
        self.complete = false;
        self.last_step = None;
    }
}

/// Byte offset `n` characters after `from`, clamped to the end of `text`.
fn advance_chars(text: &str, from: usize, n: usize) -> usize {
    text[from..].char_indices().nth(n).map_or(text.len(), |(offset, _)| from + offset)
}
