use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use bytes::Bytes;
use serde_json::json;

use super::common::resolve_runtime;
use super::streaming::{build_sse_response, error_response, json_passthrough};
use crate::proxy::mappers::claude::{
    approximate_token_count, create_anthropic_sse_stream, has_vision_content,
    translate_to_anthropic, translate_to_openai, AnthropicMessagesPayload,
    ChatCompletionResponse,
};
use crate::proxy::middleware::AuthContext;
use crate::proxy::server::AppState;

/// Anthropic Messages endpoint: translate in, forward, translate back —
/// incrementally for streams, in one shot otherwise.
pub async fn handle_messages(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    body: Bytes,
) -> Response {
    let payload: AnthropicMessagesPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, format!("invalid request: {}", e))
        }
    };

    let runtime = match resolve_runtime(&state, &context) {
        Ok(runtime) => runtime,
        Err(response) => return response,
    };

    let vision = has_vision_content(&payload);
    let openai_payload = translate_to_openai(&payload);
    let openai_body = match serde_json::to_vec(&openai_payload) {
        Ok(body) => body,
        Err(_) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to marshal request",
            )
        }
    };

    let upstream_context = runtime.read().await.upstream_context();
    let response = match state
        .instances
        .upstream()
        .proxy_request(&upstream_context, "/chat/completions", openai_body, vision)
        .await
    {
        Ok(response) => response,
        Err(e) => return error_response(StatusCode::BAD_GATEWAY, e.to_string()),
    };

    if payload.stream {
        let stream = create_anthropic_sse_stream(Box::pin(response.bytes_stream()));
        build_sse_response(StatusCode::OK, axum::body::Body::from_stream(stream))
    } else {
        handle_unary_response(response).await
    }
}

async fn handle_unary_response(response: reqwest::Response) -> Response {
    let status =
        StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(_) => return error_response(StatusCode::BAD_GATEWAY, "failed to read response"),
    };

    // Upstream failures pass through with their status preserved.
    if status != StatusCode::OK {
        return json_passthrough(status, body);
    }

    let openai_response: ChatCompletionResponse = match serde_json::from_slice(&body) {
        Ok(parsed) => parsed,
        Err(_) => {
            return error_response(StatusCode::BAD_GATEWAY, "failed to parse upstream response")
        }
    };

    Json(translate_to_anthropic(openai_response)).into_response()
}

/// Approximate count: no tokenizer is bundled, so four chars per token over
/// the serialized payload is the contract.
pub async fn handle_count_tokens(body: Bytes) -> Response {
    let payload: AnthropicMessagesPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, format!("invalid request: {}", e))
        }
    };

    Json(json!({ "input_tokens": approximate_token_count(&payload) })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_count_tokens_rejects_bad_json() {
        let response = handle_count_tokens(Bytes::from("{nope")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_count_tokens_returns_minimum_one() {
        let response = handle_count_tokens(Bytes::from(r#"{"model":"m","messages":[]}"#)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["input_tokens"], 1);
    }
}
