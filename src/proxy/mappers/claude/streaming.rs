use serde_json::json;

use super::models::*;
use super::utils::{fallback_message_id, map_finish_reason};

/// Translate one OpenAI stream chunk into zero or more Anthropic SSE events,
/// advancing the per-stream state. Pure in the functional sense: everything the
/// translation needs lives in `state`, which makes the event grammar easy to
/// property-test.
///
/// Emitted grammar:
/// ```text
/// message_start ping [ content_block_start content_block_delta* content_block_stop ]*
///   message_delta  (message_stop is emitted by the stream driver on [DONE])
/// ```
pub fn translate_chunk(
    chunk: &ChatCompletionResponse,
    state: &mut AnthropicStreamState,
) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    if !chunk.model.is_empty() {
        state.model = chunk.model.clone();
    }
    if !chunk.id.is_empty() {
        state.id = chunk.id.clone();
    }

    if !state.message_start_sent {
        state.message_start_sent = true;
        let id = if state.id.is_empty() {
            fallback_message_id()
        } else {
            state.id.clone()
        };
        events.push(StreamEvent {
            event: "message_start",
            data: json!({
                "type": "message_start",
                "message": {
                    "id": id,
                    "type": "message",
                    "role": "assistant",
                    "content": [],
                    "model": state.model,
                    "stop_reason": null,
                    "stop_sequence": null,
                    "usage": {
                        "input_tokens": state.input_tokens,
                        "output_tokens": 0,
                    },
                },
            }),
        });
        events.push(StreamEvent {
            event: "ping",
            data: json!({"type": "ping"}),
        });
    }

    // Usage typically arrives on a trailing chunk when include_usage is set.
    if let Some(usage) = &chunk.usage {
        state.input_tokens = usage.prompt_tokens;
        state.output_tokens = usage.completion_tokens;
    }

    for choice in &chunk.choices {
        let Some(delta) = &choice.delta else {
            if choice.finish_reason.is_some() {
                events.extend(close_content_block(state));
                events.push(message_delta_event(state, choice));
            }
            continue;
        };

        if let Some(content) = &delta.content {
            if !content.is_empty() {
                if !state.content_block_open || !state.tool_calls.is_empty() {
                    events.extend(close_content_block(state));
                    events.push(StreamEvent {
                        event: "content_block_start",
                        data: json!({
                            "type": "content_block_start",
                            "index": state.content_block_index,
                            "content_block": { "type": "text", "text": "" },
                        }),
                    });
                    state.content_block_open = true;
                }
                events.push(StreamEvent {
                    event: "content_block_delta",
                    data: json!({
                        "type": "content_block_delta",
                        "index": state.content_block_index,
                        "delta": { "type": "text_delta", "text": content },
                    }),
                });
            }
        }

        for call in &delta.tool_calls {
            let index = call.index.unwrap_or(0);

            // A non-empty id marks a new tool-use block; argument deltas may
            // keep arriving for the prior block without one.
            if !call.id.is_empty() {
                events.extend(close_content_block(state));
                state.tool_calls.insert(
                    index,
                    ToolCallState {
                        id: call.id.clone(),
                        name: call.function.name.clone(),
                        arguments: String::new(),
                    },
                );
                events.push(StreamEvent {
                    event: "content_block_start",
                    data: json!({
                        "type": "content_block_start",
                        "index": state.content_block_index,
                        "content_block": {
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.function.name,
                        },
                    }),
                });
                state.content_block_open = true;
            }

            if !call.function.arguments.is_empty() {
                if let Some(tracked) = state.tool_calls.get_mut(&index) {
                    tracked.arguments.push_str(&call.function.arguments);
                }
                events.push(StreamEvent {
                    event: "content_block_delta",
                    data: json!({
                        "type": "content_block_delta",
                        "index": state.content_block_index,
                        "delta": {
                            "type": "input_json_delta",
                            "partial_json": call.function.arguments,
                        },
                    }),
                });
            }
        }

        if choice.finish_reason.is_some() {
            events.extend(close_content_block(state));
            events.push(message_delta_event(state, choice));
        }
    }

    events
}

/// Close the open block if there is one: emit `content_block_stop` at the
/// current index and advance the index.
fn close_content_block(state: &mut AnthropicStreamState) -> Vec<StreamEvent> {
    if !state.content_block_open {
        return Vec::new();
    }
    state.content_block_open = false;
    let event = StreamEvent {
        event: "content_block_stop",
        data: json!({
            "type": "content_block_stop",
            "index": state.content_block_index,
        }),
    };
    state.content_block_index += 1;
    vec![event]
}

fn message_delta_event(state: &AnthropicStreamState, choice: &Choice) -> StreamEvent {
    let stop_reason = choice
        .finish_reason
        .as_deref()
        .map(map_finish_reason)
        .unwrap_or("end_turn");
    StreamEvent {
        event: "message_delta",
        data: json!({
            "type": "message_delta",
            "delta": { "stop_reason": stop_reason, "stop_sequence": null },
            "usage": { "output_tokens": state.output_tokens },
        }),
    }
}

pub fn message_stop_event() -> StreamEvent {
    StreamEvent {
        event: "message_stop",
        data: json!({"type": "message_stop"}),
    }
}
