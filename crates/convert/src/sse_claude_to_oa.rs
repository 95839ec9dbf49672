//! Claude Messages stream → OpenAI chat-completion stream
//!
//! Much simpler than the other direction: Claude's content-block framing
//! collapses into OpenAI's flat per-choice delta shape, so there's really
//! only `Idle` (before `message_start`) and `Streaming`. If the upstream
//! stream ends without a `message_stop`, the caller must call
//! [`ClaudeToOaMachine::finalize_if_unfinished`] to still produce a
//! terminating chunk and `[DONE]`.

use std::collections::HashMap;

use crate::sse_types::{ClaudeBlockDelta, ClaudeBlockStart, ClaudeEvent};
use crate::tool_names::ToolNameMap;

#[derive(Debug, Clone, PartialEq)]
enum State {
    Idle,
    Streaming,
    Done,
}

enum BlockKind {
    Text,
    Tool { openai_index: u32, header_sent: bool },
}

pub struct ClaudeToOaMachine {
    id: String,
    model: String,
    tool_names: ToolNameMap,
    state: State,
    blocks: HashMap<u32, BlockKind>,
    next_tool_openai_index: u32,
}

impl ClaudeToOaMachine {
    pub fn new(id: String, model: String, tool_names: ToolNameMap) -> Self {
        Self {
            id,
            model,
            tool_names,
            state: State::Idle,
            blocks: HashMap::new(),
            next_tool_openai_index: 0,
        }
    }

    pub fn feed(&mut self, event: ClaudeEvent) -> Vec<String> {
        if self.state == State::Done {
            return Vec::new();
        }

        match event {
            ClaudeEvent::MessageStart => {
                self.state = State::Streaming;
                vec![self.chunk(serde_json::json!({ "role": "assistant", "content": "" }))]
            }
            ClaudeEvent::ContentBlockStart { index, block } => self.handle_block_start(index, block),
            ClaudeEvent::ContentBlockDelta { index, delta } => self.handle_block_delta(index, delta),
            ClaudeEvent::ContentBlockStop { .. } => Vec::new(),
            ClaudeEvent::MessageDelta { stop_reason } => self.finish(&stop_reason),
            ClaudeEvent::MessageStop => {
                if self.state == State::Done {
                    Vec::new()
                } else {
                    self.state = State::Done;
                    vec!["data: [DONE]\n\n".to_string()]
                }
            }
        }
    }

    pub fn finalize_if_unfinished(&mut self) -> Vec<String> {
        if self.state == State::Done {
            return Vec::new();
        }
        let mut frames = self.finish("end_turn");
        frames.push("data: [DONE]\n\n".to_string());
        self.state = State::Done;
        frames
    }

    fn handle_block_start(&mut self, index: u32, block: ClaudeBlockStart) -> Vec<String> {
        match block {
            ClaudeBlockStart::Text => {
                self.blocks.insert(index, BlockKind::Text);
                Vec::new()
            }
            ClaudeBlockStart::ToolUse { id, name } => {
                let openai_index = self.next_tool_openai_index;
                self.next_tool_openai_index += 1;
                self.blocks.insert(index, BlockKind::Tool { openai_index, header_sent: false });
                let restored = self.tool_names.restore(&name).to_string();
                vec![self.chunk(serde_json::json!({
                    "role": "assistant",
                    "tool_calls": [{
                        "index": openai_index,
                        "id": id,
                        "type": "function",
                        "function": { "name": restored, "arguments": "" },
                    }],
                }))]
            }
        }
    }

    fn handle_block_delta(&mut self, index: u32, delta: ClaudeBlockDelta) -> Vec<String> {
        let Some(kind) = self.blocks.get_mut(&index) else { return Vec::new() };
        match (kind, delta) {
            (BlockKind::Text, ClaudeBlockDelta::TextDelta { text }) => {
                if text.is_empty() {
                    Vec::new()
                } else {
                    vec![self.chunk(serde_json::json!({ "content": text }))]
                }
            }
            (BlockKind::Tool { openai_index, header_sent }, ClaudeBlockDelta::InputJsonDelta { partial_json }) => {
                *header_sent = true;
                let openai_index = *openai_index;
                vec![self.chunk(serde_json::json!({
                    "tool_calls": [{
                        "index": openai_index,
                        "function": { "arguments": partial_json },
                    }],
                }))]
            }
            _ => Vec::new(),
        }
    }

    fn finish(&mut self, claude_stop_reason: &str) -> Vec<String> {
        let finish_reason = map_stop_reason_to_openai(claude_stop_reason);
        vec![self.final_chunk(finish_reason)]
    }

    fn chunk(&self, delta: serde_json::Value) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({
                "id": self.id,
                "model": self.model,
                "choices": [{ "index": 0, "delta": delta, "finish_reason": serde_json::Value::Null }],
            })
        )
    }

    fn final_chunk(&self, finish_reason: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({
                "id": self.id,
                "model": self.model,
                "choices": [{ "index": 0, "delta": {}, "finish_reason": finish_reason }],
            })
        )
    }
}

pub fn map_stop_reason_to_openai(claude_stop_reason: &str) -> &'static str {
    match claude_stop_reason {
        "end_turn" => "stop",
        "max_tokens" => "length",
        "tool_use" => "tool_calls",
        "stop_sequence" => "stop",
        _ => "stop",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_start_emits_the_role_establishing_chunk() {
        let mut m = ClaudeToOaMachine::new("req1".into(), "gpt-4o".into(), ToolNameMap::new());
        let frames = m.feed(ClaudeEvent::MessageStart);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("\"role\":\"assistant\""));
        assert!(frames[0].contains("\"content\":\"\""));
    }

    #[test]
    fn text_deltas_become_content_chunks() {
        let mut m = ClaudeToOaMachine::new("req1".into(), "gpt-4o".into(), ToolNameMap::new());
        m.feed(ClaudeEvent::MessageStart);
        m.feed(ClaudeEvent::ContentBlockStart { index: 0, block: ClaudeBlockStart::Text });
        let frames = m.feed(ClaudeEvent::ContentBlockDelta {
            index: 0,
            delta: ClaudeBlockDelta::TextDelta { text: "hi".into() },
        });
        assert!(frames[0].contains("\"content\":\"hi\""));
    }

    #[test]
    fn tool_use_start_emits_header_chunk_with_restored_name() {
        let mut names = ToolNameMap::new();
        names.record("get.weather", true);
        let mut m = ClaudeToOaMachine::new("req1".into(), "gpt-4o".into(), names);
        m.feed(ClaudeEvent::MessageStart);
        let frames = m.feed(ClaudeEvent::ContentBlockStart {
            index: 0,
            block: ClaudeBlockStart::ToolUse { id: "toolu_1".into(), name: "get_weather".into() },
        });
        assert!(frames[0].contains("get.weather") || frames[0].contains("get_weather"));
        assert!(frames[0].contains("\"index\":0"));
    }

    #[test]
    fn stream_ends_with_done_sentinel() {
        let mut m = ClaudeToOaMachine::new("req1".into(), "gpt-4o".into(), ToolNameMap::new());
        m.feed(ClaudeEvent::MessageStart);
        m.feed(ClaudeEvent::MessageDelta { stop_reason: "end_turn".into() });
        let frames = m.feed(ClaudeEvent::MessageStop);
        assert_eq!(frames, vec!["data: [DONE]\n\n".to_string()]);
    }

    #[test]
    fn finish_reason_mapping_round_trips_the_common_cases() {
        assert_eq!(map_stop_reason_to_openai("end_turn"), "stop");
        assert_eq!(map_stop_reason_to_openai("max_tokens"), "length");
        assert_eq!(map_stop_reason_to_openai("tool_use"), "tool_calls");
    }

    #[test]
    fn missing_message_stop_still_produces_done_on_finalize() {
        let mut m = ClaudeToOaMachine::new("req1".into(), "gpt-4o".into(), ToolNameMap::new());
        m.feed(ClaudeEvent::MessageStart);
        m.feed(ClaudeEvent::ContentBlockStart { index: 0, block: ClaudeBlockStart::Text });
        m.feed(ClaudeEvent::ContentBlockDelta { index: 0, delta: ClaudeBlockDelta::TextDelta { text: "partial".into() } });
        let frames = m.finalize_if_unfinished();
        assert!(frames.last().unwrap().contains("[DONE]"));
    }
}
