pub mod models;
pub mod request;
pub mod response;
pub mod streaming;
pub mod utils;

pub use models::*;
pub use request::translate_to_openai;
pub use response::translate_to_anthropic;
pub use streaming::{message_stop_event, translate_chunk};
pub use utils::{approximate_token_count, has_vision_content, map_finish_reason};

use bytes::{Bytes, BytesMut};
use futures::Stream;
use std::pin::Pin;

pub fn format_sse_event(event: &StreamEvent) -> Bytes {
    let payload = format!(
        "event: {}\ndata: {}\n\n",
        event.event,
        serde_json::to_string(&event.data).unwrap_or_default()
    );
    Bytes::from(payload)
}

/// Wrap an upstream OpenAI SSE byte stream in the Anthropic event dialect.
/// Chunks are consumed line-by-line in arrival order; a literal `[DONE]`
/// sentinel emits `message_stop` and ends the stream. Upstream EOF without the
/// sentinel just ends the stream — no terminal event is synthesized.
pub fn create_anthropic_sse_stream(
    mut upstream: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
) -> Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>> {
    use async_stream::stream;
    use futures::StreamExt;

    Box::pin(stream! {
        let mut state = AnthropicStreamState::default();
        let mut buffer = BytesMut::new();

        while let Some(chunk_result) = upstream.next().await {
            let chunk = match chunk_result {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(format!("upstream stream error: {}", e));
                    return;
                }
            };

            buffer.extend_from_slice(&chunk);
            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line_raw = buffer.split_to(pos + 1);
                let Ok(line_str) = std::str::from_utf8(&line_raw) else {
                    continue;
                };
                let line = line_str.trim();

                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };

                if data == "[DONE]" {
                    yield Ok(format_sse_event(&message_stop_event()));
                    return;
                }

                match serde_json::from_str::<ChatCompletionResponse>(data) {
                    Ok(parsed) => {
                        for event in translate_chunk(&parsed, &mut state) {
                            yield Ok(format_sse_event(&event));
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Skipping unparseable SSE chunk: {}", e);
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    async fn collect_sse(input: Vec<&'static str>) -> String {
        let upstream: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>> =
            Box::pin(futures::stream::iter(
                input.into_iter().map(|s| Ok(Bytes::from(s))),
            ));
        let mut out = String::new();
        let mut stream = create_anthropic_sse_stream(upstream);
        while let Some(item) = stream.next().await {
            out.push_str(&String::from_utf8_lossy(&item.unwrap()));
        }
        out
    }

    #[tokio::test]
    async fn test_done_sentinel_emits_message_stop() {
        let chunk = json!({
            "id": "c1",
            "model": "gpt-4o",
            "choices": [{"delta": {"content": "hi"}}],
        });
        let line1: &'static str =
            Box::leak(format!("data: {}\n", chunk).into_boxed_str());
        let out = collect_sse(vec![line1, "data: [DONE]\n"]).await;

        assert!(out.contains("event: message_start"));
        assert!(out.contains("event: ping"));
        assert!(out.contains(r#""text_delta""#));
        assert!(out.contains("event: message_stop"));
    }

    #[tokio::test]
    async fn test_eof_without_done_emits_no_message_stop() {
        let chunk = json!({"choices": [{"delta": {"content": "partial"}}]});
        let line: &'static str = Box::leak(format!("data: {}\n", chunk).into_boxed_str());
        let out = collect_sse(vec![line]).await;

        assert!(out.contains("event: message_start"));
        assert!(!out.contains("event: message_stop"));
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks_reassemble() {
        let out = collect_sse(vec![
            "data: {\"choices\":[{\"delta\":",
            "{\"content\":\"AB\"}}]}\n",
            "data: [DONE]\n",
        ])
        .await;
        assert!(out.contains(r#""text":"AB""#));
        assert!(out.contains("event: message_stop"));
    }

    #[tokio::test]
    async fn test_unparseable_chunk_is_skipped() {
        let out = collect_sse(vec!["data: {broken\n", "data: [DONE]\n"]).await;
        assert!(out.contains("event: message_stop"));
        assert!(!out.contains("text_delta"));
    }
}
