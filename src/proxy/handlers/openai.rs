use axum::{
    body::Body,
    extract::{Extension, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use bytes::Bytes;
use serde_json::Value;

use super::common::resolve_runtime;
use super::streaming::{build_sse_response, error_response, json_passthrough};
use crate::models::{ModelEntry, ModelsResponse};
use crate::modules::persistence::model_map;
use crate::proxy::middleware::AuthContext;
use crate::proxy::server::AppState;

/// Rewrite the payload's `model` from display id to upstream id; anything
/// unparseable is forwarded untouched.
fn rewrite_model(body: Bytes) -> Vec<u8> {
    let Ok(mut payload) = serde_json::from_slice::<Value>(&body) else {
        return body.to_vec();
    };
    if let Some(model) = payload.get("model").and_then(|m| m.as_str()) {
        let mapped = model_map::to_copilot_id(model);
        payload["model"] = Value::String(mapped);
        if let Ok(rewritten) = serde_json::to_vec(&payload) {
            return rewritten;
        }
    }
    body.to_vec()
}

pub async fn handle_chat_completions(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    body: Bytes,
) -> Response {
    let runtime = match resolve_runtime(&state, &context) {
        Ok(runtime) => runtime,
        Err(response) => return response,
    };

    let upstream_context = runtime.read().await.upstream_context();
    let response = match state
        .instances
        .upstream()
        .proxy_request(&upstream_context, "/chat/completions", rewrite_model(body), false)
        .await
    {
        Ok(response) => response,
        Err(e) => return error_response(StatusCode::BAD_GATEWAY, e.to_string()),
    };

    let status = StatusCode::from_u16(response.status().as_u16())
        .unwrap_or(StatusCode::BAD_GATEWAY);
    let is_stream = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/event-stream"))
        .unwrap_or(false);

    if is_stream {
        // Pass-through: the upstream already speaks the client's dialect.
        build_sse_response(status, Body::from_stream(response.bytes_stream()))
    } else {
        match response.bytes().await {
            Ok(body) => json_passthrough(status, body),
            Err(_) => error_response(StatusCode::BAD_GATEWAY, "failed to read response"),
        }
    }
}

pub async fn handle_models(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> Response {
    let runtime = match resolve_runtime(&state, &context) {
        Ok(runtime) => runtime,
        Err(response) => return response,
    };

    let models = runtime.read().await.models.clone();
    let Some(models) = models else {
        return Json(ModelsResponse {
            object: "list".to_string(),
            data: Vec::new(),
        })
        .into_response();
    };

    let mapped = ModelsResponse {
        object: models.object,
        data: models
            .data
            .into_iter()
            .map(|entry| ModelEntry {
                id: model_map::to_display_id(&entry.id),
                ..entry
            })
            .collect(),
    };
    Json(mapped).into_response()
}

pub async fn handle_embeddings(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    body: Bytes,
) -> Response {
    let runtime = match resolve_runtime(&state, &context) {
        Ok(runtime) => runtime,
        Err(response) => return response,
    };

    let upstream_context = runtime.read().await.upstream_context();
    let response = match state
        .instances
        .upstream()
        .proxy_request(&upstream_context, "/embeddings", rewrite_model(body), false)
        .await
    {
        Ok(response) => response,
        Err(e) => return error_response(StatusCode::BAD_GATEWAY, e.to_string()),
    };

    let status = StatusCode::from_u16(response.status().as_u16())
        .unwrap_or(StatusCode::BAD_GATEWAY);
    match response.bytes().await {
        Ok(body) => json_passthrough(status, body),
        Err(_) => error_response(StatusCode::BAD_GATEWAY, "failed to read response"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelMapping;
    use crate::modules::persistence::paths;
    use crate::test_utils::scoped_data_dir;

    #[test]
    fn test_rewrite_model_applies_mapping() {
        let _dir = scoped_data_dir("openai-rewrite");
        paths::ensure_files().unwrap();
        model_map::add_model_mapping(ModelMapping {
            copilot_id: "gpt-4o".to_string(),
            display_id: "claude-3-sonnet".to_string(),
            display_name: None,
        })
        .unwrap();

        let body = Bytes::from(r#"{"model":"claude-3-sonnet","messages":[]}"#);
        let rewritten: Value = serde_json::from_slice(&rewrite_model(body)).unwrap();
        assert_eq!(rewritten["model"], "gpt-4o");
    }

    #[test]
    fn test_rewrite_model_leaves_invalid_json_alone() {
        let _dir = scoped_data_dir("openai-rewrite-invalid");
        paths::ensure_files().unwrap();
        let body = Bytes::from("not json");
        assert_eq!(rewrite_model(body.clone()), body.to_vec());
    }
}
