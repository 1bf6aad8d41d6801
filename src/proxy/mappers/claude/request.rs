use serde_json::{json, Value};

use super::models::*;
use super::utils::flatten_tool_result_content;
use crate::modules::persistence::model_map;

/// Convert an Anthropic Messages payload into an OpenAI chat-completions
/// payload. Total by construction: malformed substructures degrade to empty
/// strings or are skipped, so any accepted Anthropic body yields a payload the
/// upstream will take.
pub fn translate_to_openai(payload: &AnthropicMessagesPayload) -> ChatCompletionsPayload {
    let mut result = ChatCompletionsPayload {
        model: model_map::to_copilot_id(&payload.model),
        stream: payload.stream,
        temperature: payload.temperature,
        top_p: payload.top_p,
        ..Default::default()
    };

    if payload.max_tokens > 0 {
        result.max_tokens = Some(payload.max_tokens);
    }
    if payload.stream {
        result.stream_options = Some(StreamOptions {
            include_usage: true,
        });
    }
    if let Some(stop) = &payload.stop_sequences {
        if !stop.is_empty() {
            result.stop = Some(stop.clone());
        }
    }

    let mut messages = Vec::new();
    if let Some(system) = &payload.system {
        let system_text = extract_system_text(system);
        if !system_text.is_empty() {
            messages.push(OpenAiMessage {
                role: "system".to_string(),
                content: Some(OpenAiMessageContent::Text(system_text)),
                ..Default::default()
            });
        }
    }
    for message in &payload.messages {
        messages.extend(convert_message(message));
    }
    result.messages = messages;

    for tool in &payload.tools {
        result.tools.push(OpenAiTool {
            tool_type: "function".to_string(),
            function: OpenAiFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.input_schema.clone(),
            },
        });
    }

    if let Some(tool_choice) = &payload.tool_choice {
        result.tool_choice = Some(convert_tool_choice(tool_choice));
    }

    result
}

fn extract_system_text(system: &SystemPrompt) -> String {
    match system {
        SystemPrompt::Text(text) => text.clone(),
        SystemPrompt::Blocks(blocks) => blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn convert_message(message: &AnthropicMessage) -> Vec<OpenAiMessage> {
    if let MessageContent::Text(text) = &message.content {
        return vec![OpenAiMessage {
            role: message.role.clone(),
            content: Some(OpenAiMessageContent::Text(text.clone())),
            ..Default::default()
        }];
    }

    let blocks = message.content.blocks();
    if blocks.is_empty() {
        return vec![OpenAiMessage {
            role: message.role.clone(),
            content: Some(OpenAiMessageContent::Text(String::new())),
            ..Default::default()
        }];
    }

    match message.role.as_str() {
        "assistant" => convert_assistant_message(&blocks),
        "user" => convert_user_message(&blocks),
        role => {
            let texts: Vec<&str> = blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect();
            vec![OpenAiMessage {
                role: role.to_string(),
                content: Some(OpenAiMessageContent::Text(texts.join("\n"))),
                ..Default::default()
            }]
        }
    }
}

fn convert_assistant_message(blocks: &[ContentBlock]) -> Vec<OpenAiMessage> {
    let mut text_parts: Vec<&str> = Vec::new();
    let mut tool_calls = Vec::new();

    for block in blocks {
        match block {
            ContentBlock::Text { text } => text_parts.push(text),
            ContentBlock::Thinking { thinking } => {
                if !thinking.is_empty() {
                    text_parts.push(thinking);
                }
            }
            ContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(ToolCall {
                    id: id.clone(),
                    call_type: "function".to_string(),
                    function: FunctionCall {
                        name: name.clone(),
                        arguments: serde_json::to_string(input).unwrap_or_default(),
                    },
                    index: None,
                });
            }
            _ => {}
        }
    }

    let mut message = OpenAiMessage {
        role: "assistant".to_string(),
        ..Default::default()
    };
    if !text_parts.is_empty() {
        message.content = Some(OpenAiMessageContent::Text(text_parts.join("\n")));
    }
    message.tool_calls = tool_calls;
    vec![message]
}

fn convert_user_message(blocks: &[ContentBlock]) -> Vec<OpenAiMessage> {
    let has_tool_results = blocks
        .iter()
        .any(|b| matches!(b, ContentBlock::ToolResult { .. }));

    if !has_tool_results {
        let mut parts = Vec::new();
        for block in blocks {
            match block {
                ContentBlock::Text { text } => {
                    parts.push(OpenAiContentPart::Text { text: text.clone() })
                }
                ContentBlock::Image { source } => parts.push(OpenAiContentPart::ImageUrl {
                    image_url: OpenAiImageUrl {
                        url: image_data_uri(source),
                    },
                }),
                _ => {}
            }
        }
        // A single text part collapses to a plain string message.
        if parts.len() == 1 {
            if let OpenAiContentPart::Text { text } = &parts[0] {
                return vec![OpenAiMessage {
                    role: "user".to_string(),
                    content: Some(OpenAiMessageContent::Text(text.clone())),
                    ..Default::default()
                }];
            }
        }
        return vec![OpenAiMessage {
            role: "user".to_string(),
            content: Some(OpenAiMessageContent::Parts(parts)),
            ..Default::default()
        }];
    }

    // Tool results split the turn: each result becomes a `tool` message bound
    // to its originating call, interleaved with plain user messages.
    let mut result = Vec::new();
    for block in blocks {
        match block {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                ..
            } => result.push(OpenAiMessage {
                role: "tool".to_string(),
                content: Some(OpenAiMessageContent::Text(flatten_tool_result_content(
                    content,
                ))),
                tool_call_id: Some(tool_use_id.clone()),
                ..Default::default()
            }),
            ContentBlock::Text { text } => result.push(OpenAiMessage {
                role: "user".to_string(),
                content: Some(OpenAiMessageContent::Text(text.clone())),
                ..Default::default()
            }),
            ContentBlock::Image { source } => result.push(OpenAiMessage {
                role: "user".to_string(),
                content: Some(OpenAiMessageContent::Parts(vec![
                    OpenAiContentPart::ImageUrl {
                        image_url: OpenAiImageUrl {
                            url: image_data_uri(source),
                        },
                    },
                ])),
                ..Default::default()
            }),
            _ => {}
        }
    }
    result
}

fn image_data_uri(source: &ImageSource) -> String {
    format!("data:{};base64,{}", source.media_type, source.data)
}

fn convert_tool_choice(tool_choice: &ToolChoice) -> Value {
    match tool_choice {
        ToolChoice::Mode(mode) => mode_to_openai(mode),
        ToolChoice::Spec(spec) => match spec.choice_type.as_str() {
            "tool" => json!({
                "type": "function",
                "function": { "name": spec.name },
            }),
            other => mode_to_openai(other),
        },
    }
}

fn mode_to_openai(mode: &str) -> Value {
    match mode {
        "auto" => json!("auto"),
        "any" => json!("required"),
        "none" => json!("none"),
        _ => json!("auto"),
    }
}
