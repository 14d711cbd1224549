//! Request ID middleware.
//!
//! Every request gets a UUID v7 identifier, stored in the
//! [`MiddlewareContext`] and echoed on the response as `x-request-id`.
//! Error envelopes and log lines carry the same value.
//!
//! An incoming `x-request-id` is honoured only when the stage is configured
//! to trust it (traffic from a trusted proxy) and only if it parses as a UUID.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use http::header::HeaderValue;
use portcullis_core::RequestId;

/// The header name for request ID propagation.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Middleware that generates or extracts request IDs.
#[derive(Debug, Clone, Default)]
pub struct RequestIdMiddleware {
    trust_incoming: bool,
}

impl RequestIdMiddleware {
    /// Creates a stage that always generates a fresh ID.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a stage that reuses a valid incoming `x-request-id`.
    #[must_use]
    pub fn trust_incoming() -> Self {
        Self { trust_incoming: true }
    }

    /// Returns `true` if incoming IDs are honoured.
    #[must_use]
    pub const fn trusts_incoming(&self) -> bool {
        self.trust_incoming
    }

    fn extract_request_id(&self, request: &Request) -> Option<RequestId> {
        if !self.trust_incoming {
            return None;
        }

        request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(RequestId::parse)
    }
}

impl Middleware for RequestIdMiddleware {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let request_id = self
                .extract_request_id(&request)
                .unwrap_or_else(RequestId::new);
            ctx.set_request_id(request_id);

            let mut response = next.run(ctx, request).await;

            if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            response
        })
    }
}
