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

//! Server-sent-event framing.
//!
//! [`SseParser`] turns arbitrarily split text into complete records. Records are
//! pulled lazily: whatever the caller doesn't consume stays buffered and comes
//! out of the next `push`/`finish` call. [`SseDecoder`] wraps the parser for raw
//! bytes and keeps multi-byte UTF-8 sequences that straddle reads intact.

/// One complete event record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseRecord {
    pub id: Option<String>,
    pub event: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseParser {
    /// Normalized text (`\n` line endings only) not yet split into records.
    buffer: String,
    /// Last pushed character was `\r`; a leading `\n` in the next chunk belongs to it.
    pending_cr: bool,
}

impl SseParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and iterate over the records it completes.
    pub fn push(&mut self, chunk: &str) -> Records<'_> {
        self.append_normalized(chunk);
        Records { parser: self }
    }

    /// End of stream: parse whatever is left as one last record.
    /// Complete records still buffered (never pulled) come out first.
    pub fn finish(&mut self) -> Vec<SseRecord> {
        let mut out: Vec<SseRecord> = Records { parser: self }.collect();
        self.pending_cr = false;
        let rest = std::mem::take(&mut self.buffer);
        if !rest.trim().is_empty()
            && let Some(record) = parse_block(&rest)
        {
            out.push(record);
        }
        out
    }

    fn append_normalized(&mut self, chunk: &str) {
        self.buffer.reserve(chunk.len());
        for ch in chunk.chars() {
            match ch {
                '\r' => {
                    self.buffer.push('\n');
                    self.pending_cr = true;
                }
                '\n' if self.pending_cr => self.pending_cr = false,
                _ => {
                    self.buffer.push(ch);
                    self.pending_cr = false;
                }
            }
        }
    }

    fn next_record(&mut self) -> Option<SseRecord> {
        loop {
            let end = self.buffer.find("\n\n")?;
            let block: String = self.buffer.drain(..end + 2).collect();
            if let Some(record) = parse_block(&block[..end]) {
                return Some(record);
            }
        }
    }
}

/// Lazy iterator over the complete records currently buffered.
pub struct Records<'a> {
    parser: &'a mut SseParser,
}

impl Iterator for Records<'_> {
    type Item = SseRecord;

    fn next(&mut self) -> Option<SseRecord> {
        self.parser.next_record()
    }
}

/// Parse one blank-line-delimited block. `None` when it carries no `data:` line.
fn parse_block(block: &str) -> Option<SseRecord> {
    let mut id = None;
    let mut event = None;
    let mut data: Option<String> = None;

    for line in block.split('\n') {
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix(':') {
            tracing::trace!("sse comment: {}", comment.trim());
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "id" => id = Some(value.trim().to_owned()),
            "event" => event = Some(value.trim().to_owned()),
            "data" => match data.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => data = Some(value.to_owned()),
            },
            _ => {}
        }
    }

    data.map(|data| SseRecord { id, event, data })
}

/// Byte-level front end for [`SseParser`].
#[derive(Debug, Default)]
pub struct SseDecoder {
    parser: SseParser,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Records<'_> {
        self.pending.extend_from_slice(bytes);
        let text = take_valid_utf8(&mut self.pending);
        self.parser.push(&text)
    }

    pub fn finish(&mut self) -> Vec<SseRecord> {
        if !self.pending.is_empty() {
            let rest = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            self.parser.append_normalized(&rest);
        }
        self.parser.finish()
    }
}

/// Drain the longest decodable prefix of `pending`. Invalid sequences become
/// U+FFFD; an incomplete sequence at the end is kept for the next read.
fn take_valid_utf8(pending: &mut Vec<u8>) -> String {
    let mut out = String::new();
    let mut start = 0;
    loop {
        match std::str::from_utf8(&pending[start..]) {
            Ok(valid) => {
                out.push_str(valid);
                pending.clear();
                return out;
            }
            Err(err) => {
                let valid_end = start + err.valid_up_to();
                out.push_str(&String::from_utf8_lossy(&pending[start..valid_end]));
                match err.error_len() {
                    Some(len) => {
                        out.push(char::REPLACEMENT_CHARACTER);
                        start = valid_end + len;
                    }
                    None => {
                        pending.drain(..valid_end);
                        return out;
                    }
                }
            }
        }
    }
}
