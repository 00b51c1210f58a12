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

use reqwest::StatusCode;

/// Failures talking to the job service. Always scoped to one request.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{operation} failed with status {status}{}", detail_suffix(.detail.as_deref()))]
    Status { operation: &'static str, status: StatusCode, detail: Option<String> },
    #[error("event stream response has no body")]
    MissingBody,
    #[error("invalid value for header `{name}`")]
    InvalidHeader { name: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Server-provided explanation, if the error body carried one.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

fn detail_suffix(detail: Option<&str>) -> String {
    detail.map(|d| format!(": {d}")).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    #[error("Invalid configuration")]
    InvalidConfig,
    #[error("Job submission failed")]
    SubmissionFailed,
    #[error("Event stream failed")]
    StreamFailed,
    #[error("Job failed")]
    JobFailed,
}

impl AppError {
    pub const INVALID_CONFIG_EXIT_CODE: i32 = 20;
    pub const SUBMISSION_FAILED_EXIT_CODE: i32 = 21;
    pub const STREAM_FAILED_EXIT_CODE: i32 = 22;
    pub const JOB_FAILED_EXIT_CODE: i32 = 23;

    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidConfig => Self::INVALID_CONFIG_EXIT_CODE,
            Self::SubmissionFailed => Self::SUBMISSION_FAILED_EXIT_CODE,
            Self::StreamFailed => Self::STREAM_FAILED_EXIT_CODE,
            Self::JobFailed => Self::JOB_FAILED_EXIT_CODE,
        }
    }

    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidConfig => {
                "Invalid configuration. Set --base-url or CHAT_AI_ASSISTANT_API_URL and check headers."
            }
            Self::SubmissionFailed => "The message could not be submitted. Retry with `/retry`.",
            Self::StreamFailed => "The response stream was interrupted before the job finished.",
            Self::JobFailed => "The assistant job failed on the server.",
        }
    }
}
