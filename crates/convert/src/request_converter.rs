//! Anthropic Messages request → OpenAI Chat Completions request.
//!
//! Grounded on the message-shape handling in
//! `crates/llm/src/claude.rs::ClaudeBackend::convert_messages`/`convert_tools`,
//! generalized from "internal `Message` → Claude wire format" to
//! "Anthropic wire format → OpenAI wire format".

use vandamme_core::GatewayError;

use crate::anthropic_types::{
    AnthropicRequest, AnthropicToolChoice, ContentBlock, MessageContent, SystemPrompt, ToolResultContent,
};
use crate::openai_types::{
    OpenAiContent, OpenAiContentPart, OpenAiFunctionCall, OpenAiFunctionDef, OpenAiImageUrl, OpenAiMessage,
    OpenAiRequest, OpenAiTool, OpenAiToolCall,
};
use crate::tool_names::ToolNameMap;

pub fn anthropic_to_openai(
    req: &AnthropicRequest,
    model: &str,
    tool_name_sanitization: bool,
) -> Result<(OpenAiRequest, ToolNameMap), GatewayError> {
    let max_tokens = req
        .max_tokens
        .ok_or_else(|| GatewayError::MissingRequiredField("max_tokens".to_string()))?;

    let mut tool_names = ToolNameMap::new();
    let mut messages = Vec::new();

    if let Some(system) = &req.system {
        for text in flatten_system(system) {
            messages.push(OpenAiMessage {
                role: "system".to_string(),
                content: Some(OpenAiContent::Text(text)),
                tool_calls: None,
                tool_call_id: None,
            });
        }
    }

    for message in &req.messages {
        messages.extend(convert_message(message, &mut tool_names, tool_name_sanitization)?);
    }

    let tools = req
        .tools
        .as_ref()
        .map(|tools| {
            tools
                .iter()
                .map(|t| OpenAiTool {
                    kind: "function".to_string(),
                    function: OpenAiFunctionDef {
                        name: tool_names.record(&t.name, tool_name_sanitization),
                        description: t.description.clone(),
                        parameters: t.input_schema.clone(),
                    },
                })
                .collect()
        });

    let tool_choice = req.tool_choice.as_ref().map(convert_tool_choice);

    Ok((
        OpenAiRequest {
            model: model.to_string(),
            messages,
            max_tokens: Some(max_tokens),
            temperature: req.temperature,
            top_p: req.top_p,
            tools,
            tool_choice,
            stream: req.stream,
        },
        tool_names,
    ))
}

fn flatten_system(system: &SystemPrompt) -> Vec<String> {
    match system {
        SystemPrompt::Text(text) => vec![text.clone()],
        SystemPrompt::Blocks(blocks) => blocks.iter().map(|b| b.text.clone()).collect(),
    }
}

fn convert_message(
    message: &crate::anthropic_types::AnthropicMessage,
    tool_names: &mut ToolNameMap,
    sanitize: bool,
) -> Result<Vec<OpenAiMessage>, GatewayError> {
    match &message.content {
        MessageContent::Text(text) => Ok(vec![OpenAiMessage {
            role: message.role.clone(),
            content: Some(OpenAiContent::Text(text.clone())),
            tool_calls: None,
            tool_call_id: None,
        }]),
        MessageContent::Blocks(blocks) => {
            let mut out = Vec::new();
            let mut parts = Vec::new();
            let mut tool_calls = Vec::new();

            for block in blocks {
                match block {
                    ContentBlock::Text { text } => {
                        parts.push(OpenAiContentPart::Text { text: text.clone() });
                    }
                    ContentBlock::Image { source } => {
                        parts.push(OpenAiContentPart::ImageUrl {
                            image_url: OpenAiImageUrl {
                                url: format!("data:{};base64,{}", source.media_type, source.data),
                            },
                        });
                    }
                    ContentBlock::ToolUse { id, name, input } => {
                        tool_calls.push(OpenAiToolCall {
                            id: id.clone(),
                            kind: "function".to_string(),
                            function: OpenAiFunctionCall {
                                name: tool_names.record(name, sanitize),
                                arguments: serde_json::to_string(input).unwrap_or_default(),
                            },
                        });
                    }
                    ContentBlock::ToolResult { tool_use_id, content, is_error: _ } => {
                        // Spec: emit a separate `{role: tool, ...}` message.
                        out.push(OpenAiMessage {
                            role: "tool".to_string(),
                            content: Some(OpenAiContent::Text(stringify_tool_result(content.as_ref()))),
                            tool_calls: None,
                            tool_call_id: Some(tool_use_id.clone()),
                        });
                    }
                }
            }

            if !parts.is_empty() || (!tool_calls.is_empty() && message.role == "assistant") {
                out.insert(
                    0,
                    OpenAiMessage {
                        role: message.role.clone(),
                        content: if parts.is_empty() { None } else { Some(OpenAiContent::Parts(parts)) },
                        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
                        tool_call_id: None,
                    },
                );
            }

            Ok(out)
        }
    }
}

fn stringify_tool_result(content: Option<&ToolResultContent>) -> String {
    match content {
        None => String::new(),
        Some(ToolResultContent::Text(text)) => text.clone(),
        Some(ToolResultContent::Blocks(blocks)) => blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn convert_tool_choice(choice: &AnthropicToolChoice) -> serde_json::Value {
    match choice {
        AnthropicToolChoice::Auto => serde_json::json!("auto"),
        AnthropicToolChoice::Any => serde_json::json!("required"),
        AnthropicToolChoice::Tool { name } => serde_json::json!({
            "type": "function",
            "function": { "name": name },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anthropic_types::AnthropicMessage;

    fn request(content: MessageContent) -> AnthropicRequest {
        AnthropicRequest {
            model: "claude-opus".to_string(),
            messages: vec![AnthropicMessage { role: "user".to_string(), content }],
            max_tokens: Some(256),
            system: None,
            temperature: None,
            top_p: None,
            tools: None,
            tool_choice: None,
            stream: None,
        }
    }

    #[test]
    fn missing_max_tokens_is_rejected() {
        let mut req = request(MessageContent::Text("hi".into()));
        req.max_tokens = None;
        let err = anthropic_to_openai(&req, "gpt-4o", false).unwrap_err();
        assert!(matches!(err, GatewayError::MissingRequiredField(_)));
    }

    #[test]
    fn system_prompt_is_flattened_before_messages() {
        let mut req = request(MessageContent::Text("hi".into()));
        req.system = Some(SystemPrompt::Text("be nice".into()));
        let (out, _) = anthropic_to_openai(&req, "gpt-4o", false).unwrap();
        assert_eq!(out.messages[0].role, "system");
        assert_eq!(out.messages[1].role, "user");
    }

    #[test]
    fn tool_result_becomes_separate_tool_message() {
        let req = request(MessageContent::Blocks(vec![ContentBlock::ToolResult {
            tool_use_id: "call_1".into(),
            content: Some(ToolResultContent::Text("42".into())),
            is_error: None,
        }]));
        let (out, _) = anthropic_to_openai(&req, "gpt-4o", false).unwrap();
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.messages[0].role, "tool");
        assert_eq!(out.messages[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn tool_name_sanitization_records_inverse_mapping() {
        let req = request(MessageContent::Blocks(vec![ContentBlock::ToolUse {
            id: "call_1".into(),
            name: "get.weather".into(),
            input: serde_json::json!({"loc": "SF"}),
        }]));
        let (out, names) = anthropic_to_openai(&req, "gpt-4o", true).unwrap();
        let tool_calls = out.messages[0].tool_calls.as_ref().unwrap();
        assert_eq!(tool_calls[0].function.name, "get_weather");
        assert_eq!(names.restore("get_weather"), "get.weather");
    }

    #[test]
    fn tool_choice_any_maps_to_required() {
        let mut req = request(MessageContent::Text("hi".into()));
        req.tool_choice = Some(AnthropicToolChoice::Any);
        let (out, _) = anthropic_to_openai(&req, "gpt-4o", false).unwrap();
        assert_eq!(out.tool_choice.unwrap(), serde_json::json!("required"));
    }
}
