//! The identity provider seam and its HTTP implementation.
//!
//! Every call receives a [`CookieJar`] that acts as the provider's cookie
//! channel: any `Set-Cookie` the provider issues is pushed into the jar as
//! soon as it is seen, so token rotations survive even when the call then
//! fails or reports no user.

use async_trait::async_trait;
use portcullis_core::{CookieJar, Cookies, SessionUser};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IdentityError, IdentityResult};

/// Issues and validates sessions.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the user behind the inbound session cookies, if any.
    async fn current_user(
        &self,
        cookies: &Cookies,
        jar: &mut CookieJar,
    ) -> IdentityResult<Option<SessionUser>>;

    /// Signs a user in with email and password.
    async fn sign_in(
        &self,
        email: &str,
        password: &str,
        jar: &mut CookieJar,
    ) -> IdentityResult<SessionUser>;

    /// Registers a user. Returns `None` when the provider requires email
    /// confirmation before a session exists.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
        jar: &mut CookieJar,
    ) -> IdentityResult<Option<SessionUser>>;
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    #[serde(default)]
    user: Option<SessionUser>,
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_to: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderMessage {
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
    msg: Option<String>,
}

impl ProviderMessage {
    fn into_message(self) -> Option<String> {
        self.message
            .or(self.error_description)
            .or(self.msg)
            .or(self.error)
    }
}

/// Identity provider reached over HTTP.
///
/// - `GET {base}/session` forwards the inbound `Cookie` header
/// - `POST {base}/sign-in` with `{email, password}`
/// - `POST {base}/sign-up` with `{email, password, redirect_to}`
#[derive(Debug, Clone)]
pub struct HttpIdentityProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpIdentityProvider {
    /// Creates a provider using a shared client.
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Sends `apikey: <key>` with every request.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// The provider base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("apikey", key),
            None => builder,
        }
    }

    async fn post_credentials(
        &self,
        path: &str,
        credentials: &Credentials<'_>,
        jar: &mut CookieJar,
    ) -> IdentityResult<Option<SessionUser>> {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .request(self.client.post(&url))
            .json(credentials)
            .send()
            .await?;
        capture_cookies(&response, jar);

        let status = response.status();
        if status.is_success() {
            let envelope: UserEnvelope = response.json().await?;
            return Ok(envelope.user);
        }

        let message = error_message(response).await;
        if status.is_client_error() {
            Err(IdentityError::rejected(message))
        } else {
            Err(IdentityError::Status {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn current_user(
        &self,
        cookies: &Cookies,
        jar: &mut CookieJar,
    ) -> IdentityResult<Option<SessionUser>> {
        let url = format!("{}/session", self.base_url);
        let mut builder = self.request(self.client.get(&url));
        if let Some(cookie_header) = cookies.to_header_value() {
            builder = builder.header(COOKIE, cookie_header);
        }

        let response = builder.send().await?;
        capture_cookies(&response, jar);

        match response.status() {
            status if status.is_success() => {
                let envelope: UserEnvelope = response.json().await?;
                Ok(envelope.user)
            }
            StatusCode::UNAUTHORIZED => {
                debug!("identity provider reported no session");
                Ok(None)
            }
            status => Err(IdentityError::Status {
                status: status.as_u16(),
                message: error_message(response).await,
            }),
        }
    }

    async fn sign_in(
        &self,
        email: &str,
        password: &str,
        jar: &mut CookieJar,
    ) -> IdentityResult<SessionUser> {
        let credentials = Credentials {
            email,
            password,
            redirect_to: None,
        };
        self.post_credentials("sign-in", &credentials, jar)
            .await?
            .ok_or_else(|| IdentityError::InvalidResponse("sign-in returned no user".to_string()))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
        jar: &mut CookieJar,
    ) -> IdentityResult<Option<SessionUser>> {
        let credentials = Credentials {
            email,
            password,
            redirect_to: Some(redirect_to),
        };
        self.post_credentials("sign-up", &credentials, jar).await
    }
}

fn capture_cookies(response: &Response, jar: &mut CookieJar) {
    for value in response.headers().get_all(SET_COOKIE) {
        match value.to_str() {
            Ok(raw) => jar.push_raw(raw),
            Err(_) => debug!("skipping non-text Set-Cookie from identity provider"),
        }
    }
}

async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ProviderMessage>(&body)
        .ok()
        .and_then(ProviderMessage::into_message)
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
        .unwrap_or_else(|| status.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let provider = HttpIdentityProvider::new(Client::new(), "http://idp.local/auth/");
        assert_eq!(provider.base_url(), "http://idp.local/auth");
    }

    #[test]
    fn test_user_envelope_null_user() {
        let envelope: UserEnvelope = serde_json::from_str(r#"{"user":null}"#).unwrap();
        assert!(envelope.user.is_none());
        let envelope: UserEnvelope = serde_json::from_str("{}").unwrap();
        assert!(envelope.user.is_none());
    }

    #[test]
    fn test_provider_message_precedence() {
        let msg: ProviderMessage =
            serde_json::from_str(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
                .unwrap();
        assert_eq!(msg.into_message().as_deref(), Some("Invalid login credentials"));
    }

    #[test]
    fn test_credentials_omit_redirect_for_sign_in() {
        let json = serde_json::to_string(&Credentials {
            email: "a@example.com",
            password: "pw",
            redirect_to: None,
        })
        .unwrap();
        assert_eq!(json, r#"{"email":"a@example.com","password":"pw"}"#);
    }
}
