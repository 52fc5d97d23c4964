//! Minimal server-sent-events decoder for `alt=sse` streams.
//!
//! Network chunks may split a line (or a multi-byte character) anywhere, so
//! bytes are buffered until a full line is available.

use bytes::BytesMut;

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
    data: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes and returns the `data` payloads of every event completed by them.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw = self.buffer.split_to(pos + 1);
            let text = String::from_utf8_lossy(&raw[..pos]);
            let line = text.strip_suffix('\r').unwrap_or(text.as_ref());
            if let Some(event) = self.handle_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes an event left open when the stream ends without a trailing blank line.
    pub fn finish(mut self) -> Option<String> {
        if !self.buffer.is_empty() {
            let rest = self.buffer.split();
            let line = String::from_utf8_lossy(&rest).into_owned();
            let line = line.trim_end_matches('\r');
            if let Some(event) = self.handle_line(line) {
                return Some(event);
            }
        }
        self.data.take()
    }

    fn handle_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.data.take();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        // event/id/retry carry nothing this client uses.
        if field == "data" {
            match self.data.as_mut() {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            }
        }
        None
    }
}
