//! Common types used throughout the middleware pipeline.

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE, LOCATION};
use http::StatusCode;
use http_body_util::Full;
use portcullis_core::{ErrorEnvelope, GateError, RequestId};

/// The HTTP request type used in the middleware pipeline.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type used in the middleware pipeline.
pub type Response = http::Response<Full<Bytes>>;

/// Extension trait for building the responses the gate and handlers emit.
pub trait ResponseExt {
    /// Creates a plain-text response.
    fn error(status: StatusCode, message: &str) -> Response;

    /// Creates a JSON error response.
    fn json_error(status: StatusCode, code: &str, message: &str) -> Response;

    /// Creates a JSON response from any serializable value.
    fn json<T: serde::Serialize>(status: StatusCode, value: &T) -> Response;

    /// Creates a `302 Found` pointing at `location`.
    fn redirect(location: &str) -> Response;

    /// Renders a [`GateError`] as its envelope with the mapped status.
    fn gate_error(error: &GateError, request_id: RequestId) -> Response;
}

fn with_body(status: StatusCode, content_type: &'static str, body: Bytes) -> Response {
    let mut response = http::Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

impl ResponseExt for Response {
    fn error(status: StatusCode, message: &str) -> Response {
        with_body(
            status,
            "text/plain; charset=utf-8",
            Bytes::from(message.to_string()),
        )
    }

    fn json_error(status: StatusCode, code: &str, message: &str) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": code,
                "message": message
            }
        });
        with_body(status, "application/json", Bytes::from(body.to_string()))
    }

    fn json<T: serde::Serialize>(status: StatusCode, value: &T) -> Response {
        match serde_json::to_vec(value) {
            Ok(body) => with_body(status, "application/json", Bytes::from(body)),
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize response body");
                Self::json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "response serialization failed",
                )
            }
        }
    }

    fn redirect(location: &str) -> Response {
        let mut response = http::Response::new(Full::new(Bytes::new()));
        *response.status_mut() = StatusCode::FOUND;
        let value = HeaderValue::from_str(location).unwrap_or_else(|_| {
            tracing::warn!(location, "redirect target is not a valid header value, using /");
            HeaderValue::from_static("/")
        });
        response.headers_mut().insert(LOCATION, value);
        response
    }

    fn gate_error(error: &GateError, request_id: RequestId) -> Response {
        let envelope: ErrorEnvelope = error.to_envelope(Some(&request_id.to_string()));
        Self::json(error.status_code(), &envelope)
    }
}
