//! Authenticated user identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The user reported by the identity provider for a verified session.
///
/// The access token, when the provider supplies one, is forwarded to the
/// membership store so row-level policies can scope rows to the caller. It
/// never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Provider-assigned user id.
    pub id: String,
    /// Primary email address, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Bearer token accepted by the membership store.
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
}

impl SessionUser {
    /// Creates a user with just an id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            access_token: None,
        }
    }

    /// Sets the email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the access token.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Identifier safe for logs. Never includes the email or token.
    #[must_use]
    pub fn log_id(&self) -> String {
        format!("user:{}", self.id)
    }
}

impl fmt::Debug for SessionUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionUser")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("access_token", &self.access_token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_id() {
        let user = SessionUser::new("u-1").with_email("a@example.com");
        assert_eq!(user.log_id(), "user:u-1");
    }

    #[test]
    fn test_debug_redacts_token() {
        let user = SessionUser::new("u-1").with_access_token("super-secret");
        let debug = format!("{user:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[redacted]"));
    }

    #[test]
    fn test_deserialize_provider_shape() {
        let user: SessionUser =
            serde_json::from_str(r#"{"id":"u-1","email":"a@example.com","access_token":"t"}"#)
                .unwrap();
        assert_eq!(user.access_token.as_deref(), Some("t"));

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("access_token"));
    }
}
