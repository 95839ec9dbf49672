//! OpenAI Chat Completions response → Anthropic Messages response, one-shot
//! (non-streaming) only.

use vandamme_core::new_request_id;

use crate::anthropic_types::{AnthropicResponse, AnthropicUsage, ContentBlock};
use crate::openai_types::{OpenAiContent, OpenAiResponse};
use crate::tool_names::ToolNameMap;

pub fn openai_to_anthropic(resp: &OpenAiResponse, tool_names: &ToolNameMap) -> AnthropicResponse {
    let choice = resp.choices.first();

    let mut content = Vec::new();
    if let Some(choice) = choice {
        if let Some(OpenAiContent::Text(text)) = &choice.message.content {
            if !text.is_empty() {
                content.push(ContentBlock::Text { text: text.clone() });
            }
        }
        for call in choice.message.tool_calls.iter().flatten() {
            let input = serde_json::from_str(&call.function.arguments).unwrap_or_else(|_| {
                serde_json::json!({ "parse_error": true, "raw": call.function.arguments })
            });
            content.push(ContentBlock::ToolUse {
                id: call.id.clone(),
                name: tool_names.restore(&call.function.name).to_string(),
                input,
            });
        }
    }

    let stop_reason = choice
        .and_then(|c| c.finish_reason.as_deref())
        .map(map_stop_reason)
        .unwrap_or("end_turn")
        .to_string();

    let id = if resp.id.starts_with("msg_") { resp.id.clone() } else { format!("msg_{}", resp.id) };

    AnthropicResponse {
        id: if id == "msg_" { format!("msg_{}", new_request_id()) } else { id },
        kind: "message",
        role: "assistant",
        model: resp.model.clone(),
        content,
        stop_reason,
        stop_sequence: None,
        usage: AnthropicUsage {
            input_tokens: resp.usage.as_ref().map(|u| u.prompt_tokens).unwrap_or(0),
            output_tokens: resp.usage.as_ref().map(|u| u.completion_tokens).unwrap_or(0),
        },
    }
}

pub fn map_stop_reason(openai_finish_reason: &str) -> &'static str {
    match openai_finish_reason {
        "stop" => "end_turn",
        "length" => "max_tokens",
        "tool_calls" => "tool_use",
        "content_filter" => "stop_sequence",
        _ => "end_turn",
    }
}
