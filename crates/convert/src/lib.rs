//! OpenAI Chat Completions <-> Anthropic Messages conversion: request bodies,
//! response bodies, and the two SSE streaming state machines.

pub mod anthropic_types;
pub mod openai_types;
pub mod request_converter;
pub mod response_converter;
pub mod sse_claude_to_oa;
pub mod sse_oa_to_claude;
pub mod sse_types;
pub mod tool_names;

pub use anthropic_types::{AnthropicRequest, AnthropicResponse};
pub use openai_types::{OpenAiRequest, OpenAiResponse, OpenAiStreamChunk};
pub use request_converter::anthropic_to_openai;
pub use response_converter::openai_to_anthropic;
pub use sse_claude_to_oa::ClaudeToOaMachine;
pub use sse_oa_to_claude::OaToClaudeMachine;
pub use sse_types::{ClaudeSseLineReader, OaSseLineReader, OaStreamEvent};
pub use tool_names::ToolNameMap;
