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

use crate::api::wire::{Conversation, CreateJobRequest, CreateJobResponse, ErrorBody};
use crate::config::{self, ChatConfig};
use crate::error::ApiError;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;
use std::time::Duration;

pub const IDEMPOTENCY_KEY: &str = "Idempotency-Key";
pub const LAST_EVENT_ID: &str = "Last-Event-ID";
pub const EVENT_STREAM_MIME: &str = "text/event-stream";
const STREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP side of the job service: create jobs, open their event streams,
/// list past conversations.
#[derive(Debug, Clone)]
pub struct JobClient {
    http: reqwest::Client,
    config: Arc<ChatConfig>,
}

impl JobClient {
    pub fn new(config: Arc<ChatConfig>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .default_headers(default_headers(&config)?)
            .connect_timeout(STREAM_CONNECT_TIMEOUT.min(config.timeout))
            .cookie_store(config.with_credentials)
            .build()?;
        Ok(Self { http, config })
    }

    /// Client bound to the process-wide default configuration.
    pub fn from_global() -> Result<Self, ApiError> {
        Self::new(config::current())
    }

    /// `POST /v1/jobs`. Each call carries a fresh idempotency key so a retried
    /// request the server already accepted is not executed twice.
    pub async fn submit(&self, text: &str, conversation_id: &str) -> Result<String, ApiError> {
        let idempotency_key = uuid::Uuid::new_v4().to_string();
        tracing::debug!(%conversation_id, %idempotency_key, "creating job");
        let response = self
            .http
            .post(self.config.endpoint("/v1/jobs"))
            .timeout(self.config.timeout)
            .header(IDEMPOTENCY_KEY, idempotency_key)
            .json(&CreateJobRequest { user_message: text, conversation_id })
            .send()
            .await?;
        let response = ensure_success(response, "job creation").await?;
        let body: CreateJobResponse = serde_json::from_slice(&response.bytes().await?)?;
        tracing::info!(job_id = %body.job_id, "job created");
        Ok(body.job_id)
    }

    /// `GET /v1/jobs/{job_id}/events`, resuming after `last_event_id` when given.
    /// The returned response body is the raw SSE byte stream.
    pub async fn open_event_stream(
        &self,
        job_id: &str,
        last_event_id: Option<u64>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut request = self
            .http
            .get(self.config.endpoint(&format!("/v1/jobs/{job_id}/events")))
            .header(ACCEPT, EVENT_STREAM_MIME);
        if let Some(seq) = last_event_id {
            request = request.header(LAST_EVENT_ID, seq.to_string());
        }
        tracing::debug!(%job_id, ?last_event_id, "opening event stream");
        let response = ensure_success(request.send().await?, "event stream").await?;
        if response.content_length() == Some(0) {
            return Err(ApiError::MissingBody);
        }
        Ok(response)
    }

    /// `GET /v1/conversations`.
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let response = self
            .http
            .get(self.config.endpoint("/v1/conversations"))
            .timeout(self.config.timeout)
            .send()
            .await?;
        let response = ensure_success(response, "conversation listing").await?;
        Ok(serde_json::from_slice(&response.bytes().await?)?)
    }
}

/// Headers sent on every request: JSON content negotiation, bearer auth, then
/// the configured extras (which may override the former).
pub fn default_headers(config: &ChatConfig) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ApiError::InvalidHeader { name: AUTHORIZATION.to_string() })?;
        headers.insert(AUTHORIZATION, value);
    }
    for (name, value) in &config.headers {
        let invalid = || ApiError::InvalidHeader { name: name.clone() };
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

async fn ensure_success(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.message())
        .ok()
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_owned()));
    tracing::error!(%status, operation, detail = detail.as_deref().unwrap_or(""), "request failed");
    Err(ApiError::Status { operation, status, detail })
}
