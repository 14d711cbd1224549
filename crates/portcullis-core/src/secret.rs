//! Timing-safe shared-secret comparison.

use http::header::{HeaderMap, AUTHORIZATION};
use subtle::ConstantTimeEq;

/// Compares two secrets without branching on their content.
///
/// Unequal lengths are rejected before any byte is inspected. Equal-length
/// inputs are compared over every byte.
#[must_use]
pub fn secrets_match(provided: &str, expected: &str) -> bool {
    let a = provided.as_bytes();
    let b = expected.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
