use serde_json::{json, Value};

use super::models::*;
use super::utils::{fallback_message_id, map_finish_reason};

/// Convert a unary OpenAI completion into an Anthropic `message` response.
pub fn translate_to_anthropic(response: ChatCompletionResponse) -> AnthropicResponse {
    let mut content = Vec::new();
    let mut stop_reason = "end_turn";

    for choice in &response.choices {
        let Some(message) = &choice.message else {
            continue;
        };

        if let Some(reason) = &choice.finish_reason {
            stop_reason = map_finish_reason(reason);
        }

        if let Some(text) = &message.content {
            if !text.is_empty() {
                content.push(ResponseBlock::Text { text: text.clone() });
            }
        }

        for call in &message.tool_calls {
            content.push(ResponseBlock::ToolUse {
                id: call.id.clone(),
                name: call.function.name.clone(),
                input: parse_json_safe(&call.function.arguments),
            });
        }
    }

    // Anthropic consumers require at least one content block.
    if content.is_empty() {
        content.push(ResponseBlock::Text {
            text: String::new(),
        });
    }

    let mut usage = AnthropicUsage::default();
    if let Some(u) = &response.usage {
        usage.input_tokens = u.prompt_tokens;
        usage.output_tokens = u.completion_tokens;
        if let Some(details) = &u.prompt_tokens_details {
            if details.cached_tokens > 0 {
                usage.cache_read_input_tokens = Some(details.cached_tokens);
            }
        }
    }

    let id = if response.id.is_empty() {
        fallback_message_id()
    } else {
        response.id
    };

    AnthropicResponse {
        id,
        response_type: "message".to_string(),
        role: "assistant".to_string(),
        content,
        model: response.model,
        stop_reason: Some(stop_reason.to_string()),
        stop_sequence: None,
        usage,
    }
}

fn parse_json_safe(arguments: &str) -> Value {
    if arguments.is_empty() {
        return json!({});
    }
    serde_json::from_str(arguments).unwrap_or_else(|_| json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice_with(message: ChoiceMessage, finish_reason: Option<&str>) -> Choice {
        Choice {
            index: 0,
            message: Some(message),
            delta: None,
            finish_reason: finish_reason.map(str::to_string),
        }
    }

    #[test]
    fn test_unary_text_response() {
        let response = ChatCompletionResponse {
            id: "x".to_string(),
            model: "gpt-4o".to_string(),
            choices: vec![choice_with(
                ChoiceMessage {
                    content: Some("hello".to_string()),
                    ..Default::default()
                },
                Some("stop"),
            )],
            usage: Some(OpenAiUsage {
                prompt_tokens: 1,
                completion_tokens: 1,
                ..Default::default()
            }),
        };

        let out = translate_to_anthropic(response);
        assert_eq!(out.id, "x");
        assert_eq!(out.response_type, "message");
        assert_eq!(out.role, "assistant");
        assert_eq!(out.model, "gpt-4o");
        assert_eq!(
            out.content,
            vec![ResponseBlock::Text {
                text: "hello".to_string()
            }]
        );
        assert_eq!(out.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(out.usage.input_tokens, 1);
        assert_eq!(out.usage.output_tokens, 1);
    }

    #[test]
    fn test_tool_calls_become_tool_use_blocks() {
        let response = ChatCompletionResponse {
            choices: vec![choice_with(
                ChoiceMessage {
                    content: Some("look:".to_string()),
                    tool_calls: vec![ToolCall {
                        id: "t1".to_string(),
                        call_type: "function".to_string(),
                        function: FunctionCall {
                            name: "f".to_string(),
                            arguments: r#"{"x":1}"#.to_string(),
                        },
                        index: None,
                    }],
                    ..Default::default()
                },
                Some("tool_calls"),
            )],
            ..Default::default()
        };

        let out = translate_to_anthropic(response);
        assert_eq!(out.stop_reason.as_deref(), Some("tool_use"));
        assert_eq!(out.content.len(), 2);
        assert_eq!(
            out.content[1],
            ResponseBlock::ToolUse {
                id: "t1".to_string(),
                name: "f".to_string(),
                input: serde_json::json!({"x": 1}),
            }
        );
    }

    #[test]
    fn test_unparseable_arguments_degrade_to_empty_object() {
        let response = ChatCompletionResponse {
            choices: vec![choice_with(
                ChoiceMessage {
                    tool_calls: vec![ToolCall {
                        id: "t1".to_string(),
                        function: FunctionCall {
                            name: "f".to_string(),
                            arguments: "{not json".to_string(),
                        },
                        ..Default::default()
                    }],
                    ..Default::default()
                },
                None,
            )],
            ..Default::default()
        };

        let out = translate_to_anthropic(response);
        assert_eq!(
            out.content[0],
            ResponseBlock::ToolUse {
                id: "t1".to_string(),
                name: "f".to_string(),
                input: serde_json::json!({}),
            }
        );
    }

    #[test]
    fn test_empty_choices_yield_single_empty_text_block() {
        let out = translate_to_anthropic(ChatCompletionResponse::default());
        assert_eq!(
            out.content,
            vec![ResponseBlock::Text {
                text: String::new()
            }]
        );
        assert!(out.id.starts_with("msg_"));
    }

    #[test]
    fn test_cached_tokens_surface_as_cache_read() {
        let response = ChatCompletionResponse {
            usage: Some(OpenAiUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                prompt_tokens_details: Some(PromptTokensDetails { cached_tokens: 4 }),
                ..Default::default()
            }),
            ..Default::default()
        };

        let out = translate_to_anthropic(response);
        assert_eq!(out.usage.input_tokens, 10);
        assert_eq!(out.usage.cache_read_input_tokens, Some(4));
        assert_eq!(out.usage.cache_creation_input_tokens, None);
    }
}
