// Incremental server-sent-events decoder.
//
// Chunks arrive with arbitrary boundaries (mid-line, mid-UTF-8 sequence),
// so bytes are buffered until a full line is available. Only `data:`
// fields matter to the feed; `event:`, `id:` and `retry:` are ignored.
// A line longer than the cap drops the whole event it belongs to.

/// Longest line buffered before the event is dropped.
pub(crate) const MAX_LINE_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug)]
pub(crate) struct SseDecoder {
    line: Vec<u8>,
    data: Vec<String>,
    max_line: usize,
    /// Skipping the rest of an oversized line.
    skip_line: bool,
    /// Skipping until the blank line that ends the current event.
    skip_event: bool,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    pub(crate) fn with_max_line(max_line: usize) -> Self {
        Self {
            line: Vec::new(),
            data: Vec::new(),
            max_line,
            skip_line: false,
            skip_event: false,
        }
    }

    /// Push a chunk and return the data payloads of every event it completed.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut completed = Vec::new();

        for &byte in chunk {
            match byte {
                // End of an oversized line: nothing to process.
                b'\n' if std::mem::take(&mut self.skip_line) => {}
                b'\n' => {
                    let mut line = std::mem::take(&mut self.line);
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    if let Some(payload) = self.process_line(&String::from_utf8_lossy(&line)) {
                        completed.push(payload);
                    }
                }
                _ if self.skip_line => {}
                _ if self.line.len() >= self.max_line => {
                    tracing::warn!(limit = self.max_line, "dropping oversized feed event");
                    self.line = Vec::new();
                    self.data.clear();
                    self.skip_line = true;
                    self.skip_event = true;
                }
                _ => self.line.push(byte),
            }
        }

        completed
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            if std::mem::take(&mut self.skip_event) {
                self.data.clear();
                return None;
            }
            if self.data.is_empty() {
                return None;
            }
            let payload = self.data.join("\n");
            self.data.clear();
            return Some(payload);
        }

        // Comment / keep-alive.
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        if field == "data" && !self.skip_event {
            self.data.push(value.to_owned());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_event() {
        let mut dec = SseDecoder::default();
        let out = dec.push(b"data: {\"type\":\"update\"}\n\n");
        assert_eq!(out, vec![r#"{"type":"update"}"#.to_owned()]);
    }

    #[test]
    fn event_split_across_chunks() {
        let mut dec = SseDecoder::default();
        assert!(dec.push(b"data: {\"ty").is_empty());
        assert!(dec.push(b"pe\":1}\r\n").is_empty());
        let out = dec.push(b"\r\n");
        assert_eq!(out, vec![r#"{"type":1}"#.to_owned()]);
    }

    #[test]
    fn multi_line_data_is_joined() {
        let mut dec = SseDecoder::default();
        let out = dec.push(b"data: a\ndata: b\n\n");
        assert_eq!(out, vec!["a\nb".to_owned()]);
    }

    #[test]
    fn comments_and_other_fields_are_ignored() {
        let mut dec = SseDecoder::default();
        let out = dec.push(b": keep-alive\n\nevent: update\nid: 7\ndata: x\n\n");
        assert_eq!(out, vec!["x".to_owned()]);
    }

    #[test]
    fn oversized_line_drops_its_event_only() {
        let mut dec = SseDecoder::with_max_line(8);
        assert!(dec.push(b"data: 0123456789abcdef").is_empty());
        assert!(dec.line.is_empty());
        assert!(dec.push(b"more junk\ndata: tail\n\n").is_empty());

        let out = dec.push(b"data: ok\n\n");
        assert_eq!(out, vec!["ok".to_owned()]);
    }

    #[test]
    fn two_events_in_one_chunk() {
        let mut dec = SseDecoder::default();
        let out = dec.push(b"data: 1\n\ndata: 2\n\n");
        assert_eq!(out, vec!["1".to_owned(), "2".to_owned()]);
    }
}
