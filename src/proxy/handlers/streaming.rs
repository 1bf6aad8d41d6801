use axum::{body::Body, http::StatusCode, response::Response};
use serde_json::json;

pub fn build_sse_response(status: StatusCode, body: Body) -> Response {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/event-stream")
        .header("Cache-Control", "no-cache")
        .header("Connection", "keep-alive")
        .body(body)
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({ "error": message.into() });
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

pub fn json_passthrough(status: StatusCode, body: bytes::Bytes) -> Response {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
