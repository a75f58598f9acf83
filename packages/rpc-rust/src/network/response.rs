//! Result and error envelopes written back to HTTP callers.
//!
//! Handlers build every response through [`HttpResponseSender`] so that
//! status codes and content types stay uniform across services.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use svcwire_core::ApplicationError;

const JSON: &str = "application/json";

/// Converts results and errors into HTTP responses.
pub struct HttpResponseSender;

impl HttpResponseSender {
    /// `None` becomes 204; a value becomes 200 with a JSON body.
    pub fn send_result<T: Serialize>(result: Option<T>) -> Response {
        match result {
            Some(value) => Self::send_json(StatusCode::OK, &value),
            None => StatusCode::NO_CONTENT.into_response(),
        }
    }

    /// `None` becomes 404; a value becomes 201 with a JSON body.
    pub fn send_created_result<T: Serialize>(result: Option<T>) -> Response {
        match result {
            Some(value) => Self::send_json(StatusCode::CREATED, &value),
            None => StatusCode::NOT_FOUND.into_response(),
        }
    }

    /// Always 204.
    #[must_use]
    pub fn send_deleted_result() -> Response {
        StatusCode::NO_CONTENT.into_response()
    }

    /// Writes the error envelope with the error's status, or 500 when the
    /// status is not a valid HTTP code.
    #[must_use]
    pub fn send_error(error: &ApplicationError) -> Response {
        let status = StatusCode::from_u16(error.status)
            .ok()
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        match serde_json::to_vec(&error.to_description()) {
            Ok(body) => json_response(status, body),
            // The envelope is plain strings and maps; encoding cannot really fail.
            Err(_) => status.into_response(),
        }
    }

    /// Plain body with an explicit content type, e.g. an OpenAPI document.
    pub fn send_text(content_type: &'static str, text: impl Into<String>) -> Response {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type)],
            text.into(),
        )
            .into_response()
    }

    fn send_json<T: Serialize>(status: StatusCode, value: &T) -> Response {
        match serde_json::to_vec(value) {
            Ok(body) => json_response(status, body),
            Err(e) => Self::send_error(
                &ApplicationError::internal(
                    None,
                    "SERIALIZATION_FAILED",
                    "Result cannot be encoded as JSON",
                )
                .wrap(e),
            ),
        }
    }
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response {
    (status, [(header::CONTENT_TYPE, JSON)], Body::from(body)).into_response()
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn result_statuses() {
        assert_eq!(
            HttpResponseSender::send_result(None::<Value>).status(),
            StatusCode::NO_CONTENT
        );
        let ok = HttpResponseSender::send_result(Some(json!({"id": "1"})));
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(ok.headers()[header::CONTENT_TYPE], JSON);
        assert_eq!(body_json(ok).await["id"], "1");
    }

    #[test]
    fn created_and_deleted_statuses() {
        assert_eq!(
            HttpResponseSender::send_created_result(None::<Value>).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            HttpResponseSender::send_created_result(Some(1)).status(),
            StatusCode::CREATED
        );
        assert_eq!(
            HttpResponseSender::send_deleted_result().status(),
            StatusCode::NO_CONTENT
        );
    }

    #[tokio::test]
    async fn error_envelope_uses_error_status() {
        let err = ApplicationError::not_found(Some("c1"), "NOT_FOUND", "missing");
        let response = HttpResponseSender::send_error(&err);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[header::CONTENT_TYPE], JSON);

        let body = body_json(response).await;
        assert_eq!(body["correlation_id"], "c1");
        assert_eq!(body["code"], "NOT_FOUND");
        assert_eq!(body["category"], "NotFound");
        assert_eq!(body["status"], 404);
    }

    #[test]
    fn invalid_status_defaults_to_500() {
        let err = ApplicationError::unknown(None, "X", "x").with_status(200);
        assert_eq!(
            HttpResponseSender::send_error(&err).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
