//! Server-Sent Events framing.
//!
//! Incremental parser for the `text/event-stream` format:
//! - `event:` names the event, `data:` lines carry the payload (joined with `\n`)
//! - `id:` carries the event ID
//! - an empty line dispatches the accumulated event
//! - lines starting with `:` are comments (keepalive)
//!
//! Bytes are buffered until a full line is available, so chunks may split
//! anywhere, including inside a multi-byte UTF-8 sequence. A line or event
//! larger than the parser's limit is an error.

use crate::error::Error;

/// Default cap on one line and on one event's accumulated data.
pub const DEFAULT_MAX_EVENT_BYTES: usize = 16 * 1024 * 1024;

/// One complete event from the stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// Event name (from the `event:` field).
    pub event_type: Option<String>,
    /// Payload (from `data:` field(s), joined with newlines).
    pub data: String,
    /// Event ID (from the `id:` field).
    pub id: Option<String>,
}

/// Streaming parser that accumulates bytes and yields complete frames.
#[derive(Debug)]
pub struct SseParser {
    buffer: Vec<u8>,
    event_type: Option<String>,
    data: Vec<String>,
    data_len: usize,
    id: Option<String>,
    max_event_bytes: usize,
}

impl Default for SseParser {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_EVENT_BYTES)
    }
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser that rejects any line, or any event's data, over `max_event_bytes`.
    pub fn with_limit(max_event_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            event_type: None,
            data: Vec::new(),
            data_len: 0,
            id: None,
            max_event_bytes,
        }
    }

    /// Feed bytes into the parser and return any frames they complete.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<SseFrame>, Error> {
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            if newline > self.max_event_bytes {
                return Err(self.overflow());
            }
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw[..newline]);
            let line = line.strip_suffix('\r').unwrap_or(&line);

            if line.is_empty() {
                if let Some(frame) = self.take_frame() {
                    frames.push(frame);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event_type = Some(value.to_owned()),
                "data" => {
                    self.data_len += value.len() + 1;
                    if self.data_len > self.max_event_bytes {
                        return Err(self.overflow());
                    }
                    self.data.push(value.to_owned());
                }
                "id" => self.id = Some(value.to_owned()),
                // `retry:` and unknown fields are ignored; reconnection
                // timing is owned by the client's backoff.
                _ => {}
            }
        }

        // No newline in what is left: a partial line that must stay bounded.
        if self.buffer.len() > self.max_event_bytes {
            return Err(self.overflow());
        }
        Ok(frames)
    }

    /// Drop any partial line or event (called on every new connection).
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.event_type = None;
        self.data.clear();
        self.data_len = 0;
        self.id = None;
    }

    fn overflow(&mut self) -> Error {
        self.reset();
        Error::LineTooLong {
            limit: self.max_event_bytes,
        }
    }

    fn take_frame(&mut self) -> Option<SseFrame> {
        if self.data.is_empty() && self.event_type.is_none() {
            return None;
        }
        let frame = SseFrame {
            event_type: self.event_type.take(),
            data: self.data.join("\n"),
            id: self.id.take(),
        };
        self.data.clear();
        self.data_len = 0;
        Some(frame)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_framing() {
        let mut parser = SseParser::new();
        let frames = parser.feed(b"id: 7\nevent: stack.delete\ndata: {\"path\":\"apps/api\"}\n\n").unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].id.as_deref(), Some("7"));
        assert_eq!(frames[0].event_type.as_deref(), Some("stack.delete"));
        assert_eq!(frames[0].data, r#"{"path":"apps/api"}"#);
    }

    #[test]
    fn joins_multiline_data() {
        let mut parser = SseParser::new();
        let frames = parser.feed(b"event: x\ndata: line1\ndata: line2\n\n").unwrap();
        assert_eq!(frames[0].data, "line1\nline2");
    }

    #[test]
    fn keepalive_comments_yield_nothing() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b": keepalive\n\n").unwrap().is_empty());
    }

    #[test]
    fn chunk_split_inside_multibyte_character() {
        let mut parser = SseParser::new();
        let payload = "event: stack.upsert\ndata: {\"path\":\"caf\u{e9}\"}\n\n".as_bytes();
        let split = payload
            .iter()
            .position(|b| *b == 0xC3)
            .map(|p| p + 1)
            .unwrap_or(payload.len());

        assert!(parser.feed(&payload[..split]).unwrap().is_empty());
        let frames = parser.feed(&payload[split..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{\"path\":\"caf\u{e9}\"}");
    }

    #[test]
    fn crlf_and_missing_space() {
        let mut parser = SseParser::new();
        let frames = parser.feed(b"event:refresh.status\r\ndata:{}\r\n\r\n").unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event_type.as_deref(), Some("refresh.status"));
        assert_eq!(frames[0].data, "{}");
    }

    #[test]
    fn reset_discards_partial_event() {
        let mut parser = SseParser::new();
        parser.feed(b"event: stack.snapshot\ndata: {\"rec").unwrap();
        parser.reset();

        let frames = parser.feed(b"event: stack.delete\ndata: {}\n\n").unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event_type.as_deref(), Some("stack.delete"));
        assert_eq!(frames[0].data, "{}");
    }

    #[test]
    fn unterminated_line_over_limit_is_an_error() {
        let mut parser = SseParser::with_limit(16);
        assert!(parser.feed(b"data: 0123456").unwrap().is_empty());
        let err = parser.feed(b"789abcdef").unwrap_err();
        assert!(matches!(err, Error::LineTooLong { limit: 16 }));
    }

    #[test]
    fn oversized_event_data_is_an_error() {
        let mut parser = SseParser::with_limit(16);
        parser.feed(b"data: 0123456\n").unwrap();
        assert!(parser.feed(b"data: 789abcdef\n").is_err());
    }

    #[test]
    fn parser_recovers_after_overflow() {
        let mut parser = SseParser::with_limit(16);
        assert!(parser.feed(&[b'x'; 32]).is_err());
        let frames = parser.feed(b"event: a\ndata: {}\n\n").unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{}");
    }
}
