//! Incremental server-sent-events decoding.

use std::collections::VecDeque;

use futures::StreamExt;
use futures::stream::BoxStream;

use crate::error::LlmError;

/// One dispatched SSE event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// What a backend makes of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseStep {
    Text(String),
    Skip,
    Done,
}

/// Byte-level SSE decoder; events may span network chunks.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed a chunk and return every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));
        let mut events = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(event) = parse_block(&String::from_utf8_lossy(&block)) {
                events.push(event);
            }
        }
        events
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = SseEvent::default();
    let mut data_lines = Vec::new();
    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event.event = Some(value.to_string()),
            "data" => data_lines.push(value),
            _ => {}
        }
    }
    if data_lines.is_empty() && event.event.is_none() {
        return None;
    }
    event.data = data_lines.join("\n");
    Some(event)
}

type Extract = fn(&SseEvent) -> Result<SseStep, LlmError>;

struct StreamState {
    bytes: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    done: bool,
}

/// Turn an SSE response body into a stream of text deltas.
pub fn text_stream(
    response: reqwest::Response,
    extract: Extract,
) -> BoxStream<'static, Result<String, LlmError>> {
    let state = StreamState {
        bytes: response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed(),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        done: false,
    };

    futures::stream::unfold(state, move |mut state| async move {
        loop {
            if let Some(text) = state.pending.pop_front() {
                return Some((Ok(text), state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for event in state.decoder.push(&chunk) {
                        match extract(&event) {
                            Ok(SseStep::Text(text)) if !text.is_empty() => {
                                state.pending.push_back(text)
                            }
                            Ok(SseStep::Text(_)) | Ok(SseStep::Skip) => {}
                            Ok(SseStep::Done) => {
                                state.done = true;
                                break;
                            }
                            Err(e) => {
                                state.done = true;
                                state.pending.clear();
                                return Some((Err(e), state));
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(LlmError::Http(e)), state));
                }
                None => state.done = true,
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn events_split_across_chunks_are_reassembled() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"event: delta\r\ndata: {\"a\"").is_empty());
        let events = decoder.push(b":1}\r\n\r\ndata: [DONE]\n\n");
        assert_eq!(
            events,
            vec![
                SseEvent {
                    event: Some("delta".into()),
                    data: "{\"a\":1}".into(),
                },
                SseEvent {
                    event: None,
                    data: "[DONE]".into(),
                },
            ]
        );
    }

    #[test]
    fn comments_are_ignored_and_multiline_data_joined() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b": keep-alive\n\ndata: one\ndata: two\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "one\ntwo");
    }
}
