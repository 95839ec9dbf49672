//! Parsed representations of the two SSE wire formats, plus the
//! line-buffering parsers that turn raw upstream bytes into them.
//!
//! Line buffering follows `crates/llm/src/backend.rs::OpenAIBackend::generate_stream`:
//! accumulate into a `String`, repeatedly split on the first `\n`, process
//! the line, keep the remainder for the next chunk.

use crate::openai_types::OpenAiStreamChunk;

/// One parsed unit from an OpenAI `data: ...` stream.
#[derive(Debug, Clone)]
pub enum OaStreamEvent {
    Chunk(OpenAiStreamChunk),
    Done,
}

/// Incrementally buffers raw bytes and yields complete OpenAI SSE lines as
/// parsed events. Malformed `data:` payloads are skipped with a warning —
/// locally recoverable, never surfaced to the caller.
#[derive(Default)]
pub struct OaSseLineReader {
    buffer: String,
}

impl OaSseLineReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &str) -> Vec<OaStreamEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();

        while let Some(line_end) = self.buffer.find('\n') {
            let line = self.buffer[..line_end].trim().to_string();
            self.buffer.drain(..=line_end);

            if line.is_empty() {
                continue;
            }
            let Some(payload) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) else {
                continue;
            };

            if payload.trim() == "[DONE]" {
                events.push(OaStreamEvent::Done);
                continue;
            }

            match serde_json::from_str::<OpenAiStreamChunk>(payload) {
                Ok(chunk) => events.push(OaStreamEvent::Chunk(chunk)),
                Err(e) => tracing::warn!(error = %e, "skipping malformed OpenAI SSE frame"),
            }
        }

        events
    }
}

/// One parsed Claude SSE event.
#[derive(Debug, Clone)]
pub enum ClaudeEvent {
    MessageStart,
    ContentBlockStart { index: u32, block: ClaudeBlockStart },
    ContentBlockDelta { index: u32, delta: ClaudeBlockDelta },
    ContentBlockStop { index: u32 },
    MessageDelta { stop_reason: String },
    MessageStop,
}

#[derive(Debug, Clone)]
pub enum ClaudeBlockStart {
    Text,
    ToolUse { id: String, name: String },
}

#[derive(Debug, Clone)]
pub enum ClaudeBlockDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
}

/// Buffers raw Claude SSE text (`event: <name>\ndata: <json>\n\n` frames)
/// and yields parsed [`ClaudeEvent`]s.
#[derive(Default)]
pub struct ClaudeSseLineReader {
    buffer: String,
    pending_event_name: Option<String>,
}

impl ClaudeSseLineReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &str) -> Vec<ClaudeEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();

        while let Some(line_end) = self.buffer.find('\n') {
            let line = self.buffer[..line_end].trim_end_matches('\r').to_string();
            self.buffer.drain(..=line_end);

            if line.is_empty() {
                self.pending_event_name = None;
                continue;
            }

            if let Some(name) = line.strip_prefix("event: ").or_else(|| line.strip_prefix("event:")) {
                self.pending_event_name = Some(name.trim().to_string());
                continue;
            }

            let Some(payload) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) else {
                continue;
            };

            let Some(event_name) = self.pending_event_name.clone() else {
                tracing::warn!("claude SSE data line with no preceding event line, skipping");
                continue;
            };

            match parse_claude_event(&event_name, payload) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, event = %event_name, "skipping malformed Claude SSE frame"),
            }
        }

        events
    }
}

fn parse_claude_event(name: &str, payload: &str) -> Result<Option<ClaudeEvent>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(payload)?;

    Ok(match name {
        "message_start" => Some(ClaudeEvent::MessageStart),
        "content_block_start" => {
            let index = value["index"].as_u64().unwrap_or(0) as u32;
            let block = &value["content_block"];
            let block = match block["type"].as_str() {
                Some("tool_use") => ClaudeBlockStart::ToolUse {
                    id: block["id"].as_str().unwrap_or_default().to_string(),
                    name: block["name"].as_str().unwrap_or_default().to_string(),
                },
                _ => ClaudeBlockStart::Text,
            };
            Some(ClaudeEvent::ContentBlockStart { index, block })
        }
        "content_block_delta" => {
            let index = value["index"].as_u64().unwrap_or(0) as u32;
            let delta = &value["delta"];
            let delta = match delta["type"].as_str() {
                Some("input_json_delta") => ClaudeBlockDelta::InputJsonDelta {
                    partial_json: delta["partial_json"].as_str().unwrap_or_default().to_string(),
                },
                _ => ClaudeBlockDelta::TextDelta {
                    text: delta["text"].as_str().unwrap_or_default().to_string(),
                },
            };
            Some(ClaudeEvent::ContentBlockDelta { index, delta })
        }
        "content_block_stop" => {
            let index = value["index"].as_u64().unwrap_or(0) as u32;
            Some(ClaudeEvent::ContentBlockStop { index })
        }
        "message_delta" => Some(ClaudeEvent::MessageDelta {
            stop_reason: value["delta"]["stop_reason"].as_str().unwrap_or("end_turn").to_string(),
        }),
        "message_stop" => Some(ClaudeEvent::MessageStop),
        "ping" | "content_block_stop_unused" => None,
        _ => None,
    })
}
