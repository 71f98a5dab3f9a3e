//! Incremental Server-Sent Events decoding.
//!
//! Both supported APIs stream `data: {...}` lines. Network chunks can split a
//! line, or a multi-byte UTF-8 character, anywhere, so bytes are buffered
//! until a full line is available and only then decoded.

/// Accumulates raw bytes and hands out complete `data:` payloads.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Data lines of the event currently being read.
    pending: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a network chunk; returns the payloads of every event it completed.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            self.process_line(line, &mut events);
        }

        events
    }

    /// Flush whatever is left once the byte stream has ended.
    pub fn finish(&mut self) -> Vec<String> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let raw = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']).to_string();
            self.process_line(&line, &mut events);
        }
        if !self.pending.is_empty() {
            events.push(self.pending.drain(..).collect::<Vec<_>>().join("\n"));
        }
        events
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<String>) {
        if line.is_empty() {
            // Blank line = end of event
            if !self.pending.is_empty() {
                events.push(self.pending.drain(..).collect::<Vec<_>>().join("\n"));
            }
            return;
        }

        // Comments and other fields (event:, id:, retry:) carry no payload
        if let Some(data) = line.strip_prefix("data:") {
            self.pending.push(data.strip_prefix(' ').unwrap_or(data).to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {\"a\":1}\n\n");
        assert_eq!(events, vec!["{\"a\":1}"]);
    }

    #[test]
    fn event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"te").is_empty());
        assert!(decoder.push(b"xt\":\"hi\"}\r\n").is_empty());
        let events = decoder.push(b"\r\n");
        assert_eq!(events, vec!["{\"text\":\"hi\"}"]);
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let payload = "data: là\n\n".as_bytes();
        // 'à' is two bytes; split between them.
        let split = payload.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&payload[..split]).is_empty());
        let events = decoder.push(&payload[split..]);
        assert_eq!(events, vec!["là"]);
    }

    #[test]
    fn comments_and_other_fields_ignored() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keep-alive\nevent: message\nid: 7\ndata: x\n\n");
        assert_eq!(events, vec!["x"]);
    }

    #[test]
    fn multi_line_data_joined() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: a\ndata: b\n\n");
        assert_eq!(events, vec!["a\nb"]);
    }

    #[test]
    fn finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: tail").is_empty());
        assert_eq!(decoder.finish(), vec!["tail"]);
        assert!(decoder.finish().is_empty());
    }
}
