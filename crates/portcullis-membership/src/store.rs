//! The membership store seam and its PostgREST-style HTTP implementation.

use async_trait::async_trait;
use portcullis_core::SessionUser;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::schema::{parse_rows, MembershipRowV1, MEMBERSHIP_SELECT_V1};

/// Relational store holding workspace memberships.
///
/// Implementations must restrict visible rows to the requesting user, either
/// through row-level policy (HTTP store) or by construction (in-memory store).
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Membership rows for `user`, ascending by `created_at`.
    async fn memberships(&self, user: &SessionUser) -> StoreResult<Vec<MembershipRowV1>>;

    /// Deletes a workflow scoped to a workspace.
    async fn delete_workflow(
        &self,
        user: &SessionUser,
        workspace_id: &str,
        workflow_id: &str,
    ) -> StoreResult<()>;
}

/// Membership store reached over a PostgREST-style HTTP API.
///
/// Requests carry `apikey: <api key>` and `Authorization: Bearer <token>`,
/// where the token is the user's access token when present so that row-level
/// policies apply, and the api key otherwise.
#[derive(Debug, Clone)]
pub struct HttpMembershipStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpMembershipStore {
    /// Creates a store using a shared client.
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// The store base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, builder: RequestBuilder, user: &SessionUser) -> RequestBuilder {
        let token = user.access_token.as_deref().unwrap_or(&self.api_key);
        builder
            .header("apikey", &self.api_key)
            .header(AUTHORIZATION, format!("Bearer {token}"))
    }
}

#[async_trait]
impl MembershipStore for HttpMembershipStore {
    async fn memberships(&self, user: &SessionUser) -> StoreResult<Vec<MembershipRowV1>> {
        let url = format!("{}/workspace_members", self.base_url);
        let user_filter = format!("eq.{}", user.id);
        let request = self.client.get(&url).query(&[
            ("select", MEMBERSHIP_SELECT_V1),
            ("user_id", user_filter.as_str()),
            ("order", "created_at.asc"),
        ]);

        let response = self.authorize(request, user).send().await?;
        let response = ensure_success(response).await?;
        let body = response.bytes().await?;
        let rows = parse_rows(&body)?;

        debug!(user = %user.log_id(), rows = rows.len(), "membership rows fetched");
        Ok(rows)
    }

    async fn delete_workflow(
        &self,
        user: &SessionUser,
        workspace_id: &str,
        workflow_id: &str,
    ) -> StoreResult<()> {
        let url = format!("{}/workflows", self.base_url);
        let id_filter = format!("eq.{workflow_id}");
        let workspace_filter = format!("eq.{workspace_id}");
        let request = self.client.delete(&url).query(&[
            ("id", id_filter.as_str()),
            ("workspace_id", workspace_filter.as_str()),
        ]);

        let response = self.authorize(request, user).send().await?;
        ensure_success(response).await?;
        debug!(user = %user.log_id(), workspace_id, workflow_id, "workflow deleted");
        Ok(())
    }
}

async fn ensure_success(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(ToString::to_string))
        .unwrap_or(body);
    Err(StoreError::Status {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let store = HttpMembershipStore::new(Client::new(), "http://db.local/rest/v1/", "anon");
        assert_eq!(store.base_url(), "http://db.local/rest/v1");
    }

    #[test]
    fn test_select_clause() {
        assert!(MEMBERSHIP_SELECT_V1.contains("workspace:workspaces(id,name,slug)"));
    }
}
