use super::models::{AnthropicMessagesPayload, ContentBlock, ToolResultContent};

/// OpenAI `finish_reason` → Anthropic `stop_reason`. Total: unknown reasons
/// collapse to `end_turn`.
pub fn map_finish_reason(reason: &str) -> &'static str {
    match reason {
        "stop" => "end_turn",
        "length" => "max_tokens",
        "tool_calls" => "tool_use",
        "content_filter" => "end_turn",
        _ => "end_turn",
    }
}

pub fn fallback_message_id() -> String {
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
    format!("msg_{}", nanos)
}

/// Flatten nested tool_result content to a single string. Block lists keep
/// only their text parts, joined by newlines; anything else is re-serialized.
pub fn flatten_tool_result_content(content: &Option<ToolResultContent>) -> String {
    match content {
        None => String::new(),
        Some(ToolResultContent::Text(text)) => text.clone(),
        Some(ToolResultContent::Blocks(values)) => {
            let texts: Vec<&str> = values
                .iter()
                .filter_map(|v| v.get("text").and_then(|t| t.as_str()))
                .collect();
            if texts.is_empty() {
                serde_json::to_string(values).unwrap_or_default()
            } else {
                texts.join("\n")
            }
        }
    }
}

/// Char-count heuristic over the serialized system, messages, and tools;
/// roughly four characters per token, never below one.
pub fn approximate_token_count(payload: &AnthropicMessagesPayload) -> u64 {
    let mut total_chars = 0usize;

    if let Some(system) = &payload.system {
        total_chars += serde_json::to_string(system).map(|s| s.len()).unwrap_or(0);
    }
    for message in &payload.messages {
        total_chars += serde_json::to_string(&message.content)
            .map(|s| s.len())
            .unwrap_or(0);
    }
    if !payload.tools.is_empty() {
        total_chars += serde_json::to_string(&payload.tools)
            .map(|s| s.len())
            .unwrap_or(0);
    }

    ((total_chars / 4) as u64).max(1)
}

/// True when any message carries an image block; the dispatcher then sets the
/// vision headers on the upstream call.
pub fn has_vision_content(payload: &AnthropicMessagesPayload) -> bool {
    payload.messages.iter().any(|message| {
        message
            .content
            .blocks()
            .iter()
            .any(|block| matches!(block, ContentBlock::Image { .. }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::mappers::claude::models::{AnthropicMessage, MessageContent};
    use serde_json::json;

    #[test]
    fn test_finish_reason_map_is_total_and_idempotent() {
        let known = [
            ("stop", "end_turn"),
            ("length", "max_tokens"),
            ("tool_calls", "tool_use"),
            ("content_filter", "end_turn"),
        ];
        for (input, expected) in known {
            let mapped = map_finish_reason(input);
            assert_eq!(mapped, expected);
            // Already-mapped values are still accepted and collapse to the default.
            assert_eq!(map_finish_reason(mapped), "end_turn");
        }
        assert_eq!(map_finish_reason("anything-else"), "end_turn");
    }

    #[test]
    fn test_token_count_minimum_is_one() {
        let payload = AnthropicMessagesPayload::default();
        assert_eq!(approximate_token_count(&payload), 1);
    }

    #[test]
    fn test_token_count_scales_with_content() {
        let payload = AnthropicMessagesPayload {
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: MessageContent::Text("x".repeat(400)),
            }],
            ..Default::default()
        };
        // 400 chars of content plus two JSON quotes.
        assert_eq!(approximate_token_count(&payload), 100);
    }

    #[test]
    fn test_vision_detection() {
        let without = AnthropicMessagesPayload {
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: MessageContent::Text("hi".to_string()),
            }],
            ..Default::default()
        };
        assert!(!has_vision_content(&without));

        let with = AnthropicMessagesPayload {
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: MessageContent::Blocks(vec![json!({
                    "type": "image",
                    "source": {"type": "base64", "media_type": "image/png", "data": "AAA"}
                })]),
            }],
            ..Default::default()
        };
        assert!(has_vision_content(&with));
    }

    #[test]
    fn test_flatten_tool_result_variants() {
        assert_eq!(flatten_tool_result_content(&None), "");
        assert_eq!(
            flatten_tool_result_content(&Some(ToolResultContent::Text("42".to_string()))),
            "42"
        );
        let blocks = Some(ToolResultContent::Blocks(vec![
            json!({"type": "text", "text": "a"}),
            json!({"type": "text", "text": "b"}),
        ]));
        assert_eq!(flatten_tool_result_content(&blocks), "a\nb");
    }
}
