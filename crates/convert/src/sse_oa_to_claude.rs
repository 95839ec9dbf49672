//! OpenAI chat-completion stream → Claude Messages stream
//!
//! A single-threaded cooperative state machine: `feed` consumes one parsed
//! [`OaStreamEvent`] at a time and returns zero or more ready-to-send SSE
//! frames. States: `Idle` (before the first chunk), `TextOpen` (a text
//! content block is open), `ToolOpen(n)` (tool-call content blocks `0..n`
//! are open, keyed by the upstream's own `index`), `Finishing` (message_stop
//! emitted, no further frames accepted).

use std::collections::HashMap;

use crate::openai_types::OpenAiStreamChunk;
use crate::sse_types::OaStreamEvent;
use crate::tool_names::ToolNameMap;

#[derive(Debug, Clone, PartialEq)]
enum State {
    Idle,
    TextOpen,
    ToolOpen,
    Finishing,
}

struct ToolBlock {
    claude_index: u32,
    id: String,
    name: String,
}

pub struct OaToClaudeMachine {
    request_id: String,
    model: String,
    tool_names: ToolNameMap,
    state: State,
    next_claude_index: u32,
    text_claude_index: Option<u32>,
    tool_blocks: HashMap<u32, ToolBlock>,
    next_tool_ordinal: u32,
    message_start_emitted: bool,
    message_stop_emitted: bool,
}

impl OaToClaudeMachine {
    pub fn new(request_id: String, model: String, tool_names: ToolNameMap) -> Self {
        Self {
            request_id,
            model,
            tool_names,
            state: State::Idle,
            next_claude_index: 0,
            text_claude_index: None,
            tool_blocks: HashMap::new(),
            next_tool_ordinal: 0,
            message_start_emitted: false,
            message_stop_emitted: false,
        }
    }

    pub fn feed(&mut self, event: OaStreamEvent) -> Vec<String> {
        match event {
            OaStreamEvent::Chunk(chunk) => self.feed_chunk(chunk),
            OaStreamEvent::Done => self.finish(None),
        }
    }

    /// Call once after the upstream stream ends, in case it never sent a
    /// `[DONE]` sentinel (connection simply closed).
    pub fn finalize_if_unfinished(&mut self) -> Vec<String> {
        if self.message_stop_emitted {
            Vec::new()
        } else {
            self.finish(None)
        }
    }

    fn feed_chunk(&mut self, chunk: OpenAiStreamChunk) -> Vec<String> {
        let mut frames = Vec::new();

        if !self.message_start_emitted {
            frames.push(self.message_start_frame());
            self.message_start_emitted = true;
        }

        let Some(choice) = chunk.choices.first() else {
            return frames;
        };

        if let Some(delta) = &choice.delta {
            if let Some(text) = &delta.content {
                if !text.is_empty() {
                    frames.extend(self.open_text_block_if_needed());
                    frames.push(self.text_delta_frame(text));
                }
            }

            for tool_delta in delta.tool_calls.iter().flatten() {
                frames.extend(self.handle_tool_delta(tool_delta));
            }
        }

        if let Some(reason) = &choice.finish_reason {
            frames.extend(self.finish(Some(reason.as_str())));
        }

        frames
    }

    fn open_text_block_if_needed(&mut self) -> Vec<String> {
        if self.state == State::TextOpen {
            return Vec::new();
        }
        let mut frames = self.close_open_tool_blocks();
        let index = self.allocate_index();
        self.text_claude_index = Some(index);
        self.state = State::TextOpen;
        frames.push(format!(
            "event: content_block_start\ndata: {}\n\n",
            serde_json::json!({
                "type": "content_block_start",
                "index": index,
                "content_block": { "type": "text", "text": "" },
            })
        ));
        frames
    }

    fn handle_tool_delta(&mut self, delta: &crate::openai_types::OpenAiToolCallDelta) -> Vec<String> {
        let mut frames = Vec::new();

        if !self.tool_blocks.contains_key(&delta.index) {
            if self.state == State::TextOpen {
                frames.extend(self.close_text_block());
            }
            // A different tool index was already open: Claude only ever has
            // one open content block at a time, so close it before starting
            // the new one.
            frames.extend(self.close_open_tool_blocks());
            let claude_index = self.allocate_index();
            let id = delta.id.clone().unwrap_or_else(|| {
                format!("toolu_{}_{}", self.request_id, self.next_tool_ordinal)
            });
            let name = delta
                .function
                .as_ref()
                .and_then(|f| f.name.clone())
                .unwrap_or_default();
            let restored_name = self.tool_names.restore(&name).to_string();
            self.next_tool_ordinal += 1;
            self.state = State::ToolOpen;
            frames.push(format!(
                "event: content_block_start\ndata: {}\n\n",
                serde_json::json!({
                    "type": "content_block_start",
                    "index": claude_index,
                    "content_block": { "type": "tool_use", "id": id, "name": restored_name, "input": {} },
                })
            ));
            self.tool_blocks.insert(
                delta.index,
                ToolBlock { claude_index, id, name: restored_name },
            );
        }

        if let Some(args) = delta.function.as_ref().and_then(|f| f.arguments.clone()) {
            if !args.is_empty() {
                let claude_index = self.tool_blocks[&delta.index].claude_index;
                frames.push(format!(
                    "event: content_block_delta\ndata: {}\n\n",
                    serde_json::json!({
                        "type": "content_block_delta",
                        "index": claude_index,
                        "delta": { "type": "input_json_delta", "partial_json": args },
                    })
                ));
            }
        }

        frames
    }

    fn close_text_block(&mut self) -> Vec<String> {
        let Some(index) = self.text_claude_index.take() else { return Vec::new() };
        self.state = State::Idle;
        vec![content_block_stop_frame(index)]
    }

    fn close_open_tool_blocks(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        for block in self.tool_blocks.values() {
            frames.push(content_block_stop_frame(block.claude_index));
        }
        self.tool_blocks.clear();
        frames
    }

    fn allocate_index(&mut self) -> u32 {
        let index = self.next_claude_index;
        self.next_claude_index += 1;
        index
    }

    fn finish(&mut self, openai_finish_reason: Option<&str>) -> Vec<String> {
        if self.message_stop_emitted {
            return Vec::new();
        }

        let mut frames = Vec::new();
        if !self.message_start_emitted {
            frames.push(self.message_start_frame());
            self.message_start_emitted = true;
        }

        if let Some(index) = self.text_claude_index.take() {
            frames.push(content_block_stop_frame(index));
        }
        for block in self.tool_blocks.values() {
            frames.push(content_block_stop_frame(block.claude_index));
        }
        self.tool_blocks.clear();
        self.state = State::Finishing;

        let stop_reason = openai_finish_reason
            .map(crate::response_converter::map_stop_reason)
            .unwrap_or("end_turn");

        frames.push(format!(
            "event: message_delta\ndata: {}\n\n",
            serde_json::json!({
                "type": "message_delta",
                "delta": { "stop_reason": stop_reason, "stop_sequence": serde_json::Value::Null },
            })
        ));
        frames.push("event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n".to_string());
        self.message_stop_emitted = true;

        frames
    }

    fn message_start_frame(&self) -> String {
        format!(
            "event: message_start\ndata: {}\n\n",
            serde_json::json!({
                "type": "message_start",
                "message": {
                    "id": format!("msg_{}", self.request_id),
                    "type": "message",
                    "role": "assistant",
                    "model": self.model,
                    "content": [],
                    "stop_reason": serde_json::Value::Null,
                    "usage": { "input_tokens": 0, "output_tokens": 0 },
                },
            })
        )
    }
}

fn content_block_stop_frame(index: u32) -> String {
    format!(
        "event: content_block_stop\ndata: {}\n\n",
        serde_json::json!({ "type": "content_block_stop", "index": index })
    )
}
