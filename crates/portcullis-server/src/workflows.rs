//! Workflow deletion, restricted to workspace admins.

use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use portcullis_core::{GateError, RequestId, Role, SessionUser};
use portcullis_membership::{MembershipResolver, MembershipStore, WorkspaceGuard};
use portcullis_middleware::{Response, ResponseExt};
use serde::Deserialize;
use tracing::{info, warn};

/// Path prefix of the workflow resource.
pub const WORKFLOWS_PREFIX: &str = "/api/workflows/";

#[derive(Debug, Default, Deserialize)]
struct WorkspaceQuery {
    workspace_id: Option<String>,
}

/// Extracts `{id}` from `/api/workflows/{id}`.
#[must_use]
pub fn workflow_id(path: &str) -> Option<&str> {
    let id = path.strip_prefix(WORKFLOWS_PREFIX)?.trim_end_matches('/');
    (!id.is_empty() && !id.contains('/')).then_some(id)
}

/// `DELETE /api/workflows/{id}?workspace_id={ws}`.
#[derive(Clone)]
pub struct WorkflowEndpoint {
    guard: WorkspaceGuard,
    store: Arc<dyn MembershipStore>,
}

impl std::fmt::Debug for WorkflowEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEndpoint").finish_non_exhaustive()
    }
}

impl WorkflowEndpoint {
    /// Creates the endpoint over the resolver the gate uses.
    #[must_use]
    pub fn new(resolver: MembershipResolver) -> Self {
        let store = Arc::clone(resolver.store());
        Self {
            guard: WorkspaceGuard::new(resolver),
            store,
        }
    }

    /// Deletes `workflow_id` from the workspace named in `query`.
    ///
    /// `204` on success, `400` without a workspace id, `401` without a
    /// session, `403` below admin, `502` when the store fails.
    pub async fn delete(
        &self,
        user: Option<SessionUser>,
        request_id: RequestId,
        workflow_id: &str,
        query: Option<&str>,
    ) -> Response {
        let workspace_id = serde_urlencoded::from_str::<WorkspaceQuery>(query.unwrap_or_default())
            .ok()
            .and_then(|q| q.workspace_id)
            .filter(|ws| !ws.is_empty());
        let Some(workspace_id) = workspace_id else {
            return Response::json_error(
                StatusCode::BAD_REQUEST,
                "MISSING_WORKSPACE_ID",
                "workspace_id query parameter is required",
            );
        };

        let Some(user) = user else {
            return Response::gate_error(&GateError::Unauthenticated, request_id);
        };

        if let Err(e) = self.guard.require(&user, &workspace_id, Role::Admin).await {
            warn!(user = %user.log_id(), workspace = %workspace_id, error = %e, "workflow deletion refused");
            return Response::gate_error(&e, request_id);
        }

        match self.store.delete_workflow(&user, &workspace_id, workflow_id).await {
            Ok(()) => {
                info!(user = %user.log_id(), workspace = %workspace_id, workflow = workflow_id, "workflow deleted");
                let mut response = Response::new(Full::new(Bytes::new()));
                *response.status_mut() = StatusCode::NO_CONTENT;
                response
            }
            Err(e) => {
                warn!(workspace = %workspace_id, workflow = workflow_id, error = %e, "workflow deletion failed");
                Response::gate_error(&GateError::from(e), request_id)
            }
        }
    }
}
