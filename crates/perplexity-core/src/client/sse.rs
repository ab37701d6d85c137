//! Line-oriented decoder for `text/event-stream` bodies

/// Event payload terminating an OpenAI-style completion stream
pub const DONE_MARKER: &str = "[DONE]";

/// Buffers raw body bytes and yields the payload of every complete `data:` line
///
/// Chunks from the network can split lines (and UTF-8 sequences) anywhere,
/// so bytes are only decoded once a newline has been seen.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a body chunk, returning the data payloads it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(payload) = data_payload(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush a trailing line that was not newline-terminated
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim_end_matches(['\n', '\r']);
    let rest = text.strip_prefix("data:")?;
    let payload = rest.strip_prefix(' ').unwrap_or(rest);
    if payload.is_empty() {
        return None;
    }
    Some(payload.to_string())
}

/// Text delta of the first choice in a streamed chunk, if any
pub fn delta_content(payload: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    value
        .pointer("/choices/0/delta/content")
        .and_then(|c| c.as_str())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// Whether a streamed payload reports an upstream failure instead of a delta
pub fn is_error_payload(payload: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(payload)
        .ok()
        .and_then(|v| v.get("error").map(|e| !e.is_null()))
        .unwrap_or(false)
}
