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

use super::{ToolCallInfo, ToolCallStatus};
use serde_json::Value;
use std::collections::HashMap;

pub const DEFAULT_REQUESTED_TOOL: &str = "tool";
pub const UNKNOWN_TOOL: &str = "unknown";

#[derive(Debug, Clone, PartialEq)]
struct TrackedCall {
    tool: String,
    status: ToolCallStatus,
    data: Option<Value>,
}

/// Tool calls of one assistant turn keyed by server call id, in first-seen order.
/// Pending entries never carry a payload; completed entries always do.
#[derive(Debug, Default)]
pub struct ToolCallMap {
    order: Vec<String>,
    calls: HashMap<String, TrackedCall>,
}

impl ToolCallMap {
    /// `tool.requested`: track a call as executing.
    /// A call that already completed keeps its result.
    pub fn request(&mut self, call_id: &str, tool: &str) {
        if let Some(existing) = self.calls.get_mut(call_id) {
            if existing.status == ToolCallStatus::Completed {
                tracing::debug!(call_id, "tool.requested after completion; keeping result");
            } else {
                existing.tool = tool.to_owned();
            }
            return;
        }
        self.insert(call_id, TrackedCall {
            tool: tool.to_owned(),
            status: ToolCallStatus::Executing,
            data: None,
        });
    }

    /// `tool.completed`: attach the result. Unseen call ids (the request event
    /// was missed) are accepted with `tool_name` or a name inferred from `result`.
    pub fn complete(&mut self, call_id: &str, tool_name: Option<&str>, result: Value) {
        if let Some(existing) = self.calls.get_mut(call_id) {
            existing.status = ToolCallStatus::Completed;
            existing.data = Some(result);
            if let Some(name) = tool_name {
                existing.tool = name.to_owned();
            }
            return;
        }
        let tool = tool_name.map_or_else(|| infer_tool_name(&result).to_owned(), str::to_owned);
        tracing::debug!(call_id, %tool, "tool.completed for untracked call");
        self.insert(call_id, TrackedCall {
            tool,
            status: ToolCallStatus::Completed,
            data: Some(result),
        });
    }

    fn insert(&mut self, call_id: &str, call: TrackedCall) {
        self.order.push(call_id.to_owned());
        self.calls.insert(call_id.to_owned(), call);
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &TrackedCall)> {
        self.order.iter().filter_map(|id| self.calls.get(id).map(|c| (id.as_str(), c)))
    }

    #[must_use]
    pub fn pending(&self) -> Vec<ToolCallInfo> {
        self.iter().filter(|(_, c)| c.data.is_none()).map(|(_, c)| info(c)).collect()
    }

    #[must_use]
    pub fn completed(&self) -> Vec<ToolCallInfo> {
        self.iter().filter(|(_, c)| c.data.is_some()).map(|(_, c)| info(c)).collect()
    }

    #[must_use]
    pub fn pending_ids(&self) -> Vec<&str> {
        self.iter().filter(|(_, c)| c.data.is_none()).map(|(id, _)| id).collect()
    }

    #[must_use]
    pub fn completed_ids(&self) -> Vec<&str> {
        self.iter().filter(|(_, c)| c.data.is_some()).map(|(id, _)| id).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn info(call: &TrackedCall) -> ToolCallInfo {
    ToolCallInfo { tool: call.tool.clone(), status: call.status, data: call.data.clone() }
}

/// Guess the tool from the shape of its result.
#[must_use]
pub fn infer_tool_name(result: &Value) -> &'static str {
    let Some(obj) = result.as_object() else {
        return UNKNOWN_TOOL;
    };
    let truthy = |key: &str| obj.get(key).is_some_and(is_truthy);
    if truthy("title") || truthy("items") {
        "generate_checklist"
    } else if truthy("translated_text") {
        "translate_text"
    } else {
        UNKNOWN_TOOL
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
