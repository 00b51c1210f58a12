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

//! Event-stream read loop for one job connection.

use crate::api::client::JobClient;
use crate::api::events::{ClientEvent, TurnId};
use crate::api::sse::{SseDecoder, SseRecord};
use crate::api::wire::{JobEvent, parse_event_id};
use futures::StreamExt as _;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Per-connection bookkeeping. Only `last_event_id` outlives a connection
/// (it is reported back so a reconnect can resume after it).
#[derive(Debug, Default)]
pub struct StreamSession {
    pub last_event_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// `job.completed` / `job.failed` arrived; the connection was released early.
    JobFinished,
    /// The server closed the stream without a terminal event.
    Ended,
    /// The cancellation token fired.
    Cancelled,
    /// Opening or reading failed; reported as `StreamFailed`.
    Failed,
    /// The state owner is gone.
    Disconnected,
}

/// Open the job's event stream and forward decoded events until the job
/// concludes, the stream ends, or `cancel` fires.
pub async fn stream_job_events(
    client: &JobClient,
    turn: TurnId,
    job_id: &str,
    last_event_id: Option<u64>,
    cancel: &CancellationToken,
    tx: &mpsc::UnboundedSender<ClientEvent>,
) -> StreamOutcome {
    let mut session = StreamSession { last_event_id };

    let opened = tokio::select! {
        () = cancel.cancelled() => {
            tracing::debug!(%turn, "stream open aborted by user");
            return StreamOutcome::Cancelled;
        }
        opened = client.open_event_stream(job_id, last_event_id) => opened,
    };
    let response = match opened {
        Ok(response) => response,
        Err(err) => return report_failure(&session, turn, cancel, tx, err.to_string()),
    };

    let mut bytes = response.bytes_stream();
    let mut decoder = SseDecoder::new();
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(%turn, "stream aborted by user");
                return StreamOutcome::Cancelled;
            }
            next = bytes.next() => next,
        };
        match next {
            Some(Ok(chunk)) => {
                for record in decoder.push(&chunk) {
                    if let Some(outcome) = forward(&mut session, turn, &record, tx) {
                        return outcome;
                    }
                }
            }
            Some(Err(err)) => {
                return report_failure(&session, turn, cancel, tx, format!("stream read: {err}"));
            }
            None => break,
        }
    }

    for record in decoder.finish() {
        if let Some(outcome) = forward(&mut session, turn, &record, tx) {
            return outcome;
        }
    }
    tracing::info!(%turn, last_event_id = ?session.last_event_id, "event stream closed by server");
    if tx.send(ClientEvent::StreamEnded { turn, last_event_id: session.last_event_id }).is_err() {
        return StreamOutcome::Disconnected;
    }
    StreamOutcome::Ended
}

/// Decode and forward one record. `Some` when the read loop must stop.
fn forward(
    session: &mut StreamSession,
    turn: TurnId,
    record: &SseRecord,
    tx: &mpsc::UnboundedSender<ClientEvent>,
) -> Option<StreamOutcome> {
    if record.data.trim().is_empty() {
        return None;
    }
    if let Some(seq) = parse_event_id(record.id.as_deref()) {
        session.last_event_id = Some(seq);
    } else if let Some(raw) = record.id.as_deref() {
        tracing::debug!(%turn, id = raw, "ignoring malformed event id");
    }

    let event = match JobEvent::from_record(record) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(
                %turn,
                event = record.event.as_deref().unwrap_or(""),
                "dropping malformed event payload: {err}"
            );
            return None;
        }
    };
    tracing::debug!(%turn, id = ?record.id, event = ?record.event, "sse event");

    let terminal = event.is_terminal();
    let sent = tx.send(ClientEvent::Job { turn, last_event_id: session.last_event_id, event });
    if sent.is_err() {
        return Some(StreamOutcome::Disconnected);
    }
    if terminal {
        tracing::debug!(%turn, "job finished, closing event stream");
        return Some(StreamOutcome::JobFinished);
    }
    None
}

fn report_failure(
    session: &StreamSession,
    turn: TurnId,
    cancel: &CancellationToken,
    tx: &mpsc::UnboundedSender<ClientEvent>,
    message: String,
) -> StreamOutcome {
    if cancel.is_cancelled() {
        tracing::debug!(%turn, "stream aborted by user");
        return StreamOutcome::Cancelled;
    }
    tracing::error!(%turn, "event stream failed: {message}");
    let _ = tx.send(ClientEvent::StreamFailed {
        turn,
        last_event_id: session.last_event_id,
        message,
    });
    StreamOutcome::Failed
}
