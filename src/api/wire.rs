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

use crate::api::sse::SseRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateJobRequest<'a> {
    pub user_message: &'a str,
    pub conversation_id: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateJobResponse {
    pub job_id: String,
}

/// Entry of `GET /v1/conversations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub message_count: u64,
}

/// FastAPI-style error body.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    #[must_use]
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgentDelta {
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgentMessage {
    pub role: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToolRequested {
    pub name: Option<String>,
    pub arguments: Option<serde_json::Value>,
    pub call_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToolCompleted {
    pub call_id: Option<String>,
    pub result: Option<serde_json::Value>,
    pub tool_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct JobStatusChange {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct JobFailure {
    pub error: Option<JobErrorDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct JobErrorDetail {
    pub message: Option<String>,
    pub code: Option<String>,
}

impl JobFailure {
    pub const DEFAULT_MESSAGE: &'static str = "Job failed";

    #[must_use]
    pub fn message(&self) -> &str {
        self.error
            .as_ref()
            .and_then(|e| e.message.as_deref())
            .filter(|m| !m.is_empty())
            .unwrap_or(Self::DEFAULT_MESSAGE)
    }
}

/// One decoded record of a job's event stream, keyed by the `event:` field.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Started,
    AgentDelta(AgentDelta),
    AgentMessage(AgentMessage),
    ToolRequested(ToolRequested),
    ToolCompleted(ToolCompleted),
    Paused(JobStatusChange),
    Resumed(JobStatusChange),
    Completed,
    Failed(JobFailure),
    /// Event type this client doesn't know. Ignored, kept for logging.
    Unknown { event: Option<String> },
}

impl JobEvent {
    pub const STARTED: &'static str = "job.started";
    pub const AGENT_DELTA: &'static str = "agent.delta";
    pub const AGENT_MESSAGE: &'static str = "agent.message";
    pub const TOOL_REQUESTED: &'static str = "tool.requested";
    pub const TOOL_COMPLETED: &'static str = "tool.completed";
    pub const PAUSED: &'static str = "job.paused";
    pub const RESUMED: &'static str = "job.resumed";
    pub const COMPLETED: &'static str = "job.completed";
    pub const FAILED: &'static str = "job.failed";

    /// Decode a record. The data field must be JSON whatever the event type;
    /// a payload that doesn't fit its event's shape is an error too.
    pub fn from_record(record: &SseRecord) -> Result<Self, serde_json::Error> {
        let payload: serde_json::Value = serde_json::from_str(&record.data)?;
        let event = match record.event.as_deref() {
            Some(Self::STARTED) => Self::Started,
            Some(Self::AGENT_DELTA) => Self::AgentDelta(serde_json::from_value(payload)?),
            Some(Self::AGENT_MESSAGE) => Self::AgentMessage(serde_json::from_value(payload)?),
            Some(Self::TOOL_REQUESTED) => Self::ToolRequested(serde_json::from_value(payload)?),
            Some(Self::TOOL_COMPLETED) => Self::ToolCompleted(serde_json::from_value(payload)?),
            Some(Self::PAUSED) => Self::Paused(serde_json::from_value(payload)?),
            Some(Self::RESUMED) => Self::Resumed(serde_json::from_value(payload)?),
            Some(Self::COMPLETED) => Self::Completed,
            Some(Self::FAILED) => Self::Failed(serde_json::from_value(payload)?),
            other => Self::Unknown { event: other.map(str::to_owned) },
        };
        Ok(event)
    }

    /// `job.completed` and `job.failed` end the turn regardless of the socket.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }
}

/// Sequence number from an `id:` field. Malformed ids yield `None`.
#[must_use]
pub fn parse_event_id(id: Option<&str>) -> Option<u64> {
    id.and_then(|raw| raw.trim().parse().ok())
}
