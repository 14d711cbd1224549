//! Workspace membership resolution.
//!
//! [`MembershipResolver`] turns store rows into ordered [`Membership`] values
//! and offers two degraded views for callers that cannot act on an error:
//! rendering contexts get an empty list, routing gets
//! [`WorkspaceState::Unknown`], which the routing machine treats as "no
//! workspace". A failure never reads as "has workspace".

use std::sync::Arc;
use std::time::Duration;

use portcullis_core::{GateError, Membership, Role, SessionUser, WorkspaceState};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::MembershipStore;

/// Default bound on a membership query.
pub const DEFAULT_MEMBERSHIP_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolves a user's memberships through a [`MembershipStore`].
#[derive(Clone)]
pub struct MembershipResolver {
    store: Arc<dyn MembershipStore>,
    timeout: Duration,
}

impl std::fmt::Debug for MembershipResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipResolver")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl MembershipResolver {
    /// Creates a resolver with [`DEFAULT_MEMBERSHIP_TIMEOUT`].
    pub fn new(store: Arc<dyn MembershipStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_MEMBERSHIP_TIMEOUT,
        }
    }

    /// Overrides the query timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn MembershipStore> {
        &self.store
    }

    /// Memberships for `user`, ascending by creation time.
    ///
    /// Rows whose workspace join did not resolve are dropped.
    pub async fn list_memberships(&self, user: &SessionUser) -> Result<Vec<Membership>, GateError> {
        let rows = tokio::time::timeout(self.timeout, self.store.memberships(user))
            .await
            .unwrap_or_else(|_| Err(StoreError::Timeout(self.timeout)))?;

        let total = rows.len();
        let mut memberships: Vec<Membership> = rows
            .into_iter()
            .filter_map(|row| {
                let workspace_id = row.workspace_id.clone();
                let membership = row.into_membership();
                if membership.is_none() {
                    debug!(user = %user.log_id(), %workspace_id, "dropping membership without workspace");
                }
                membership
            })
            .collect();
        memberships.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        debug!(
            user = %user.log_id(),
            rows = total,
            memberships = memberships.len(),
            "memberships resolved"
        );
        Ok(memberships)
    }

    /// Memberships for rendering contexts. Failures yield an empty list.
    pub async fn list_memberships_or_empty(&self, user: &SessionUser) -> Vec<Membership> {
        match self.list_memberships(user).await {
            Ok(memberships) => memberships,
            Err(err) => {
                warn!(user = %user.log_id(), error = %err, "membership query failed, rendering with none");
                Vec::new()
            }
        }
    }

    /// Membership existence for routing. Failures yield
    /// [`WorkspaceState::Unknown`].
    pub async fn workspace_state(&self, user: &SessionUser) -> WorkspaceState {
        match self.list_memberships(user).await {
            Ok(memberships) if memberships.is_empty() => WorkspaceState::None,
            Ok(memberships) => WorkspaceState::Some(memberships.len()),
            Err(err) => {
                warn!(user = %user.log_id(), error = %err, "membership query failed, routing as no workspace");
                WorkspaceState::Unknown
            }
        }
    }
}

/// Role check for a specific workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    resolver: MembershipResolver,
}

impl WorkspaceGuard {
    /// Creates a guard over a resolver.
    pub const fn new(resolver: MembershipResolver) -> Self {
        Self { resolver }
    }

    /// Returns the caller's membership in `workspace_id` if its role is at
    /// least `min_role`.
    ///
    /// Store failures surface as [`GateError::MembershipQueryFailed`]; a
    /// missing membership or insufficient role as [`GateError::Forbidden`].
    pub async fn require(
        &self,
        user: &SessionUser,
        workspace_id: &str,
        min_role: Role,
    ) -> Result<Membership, GateError> {
        let memberships = self.resolver.list_memberships(user).await?;
        let Some(membership) = memberships
            .into_iter()
            .find(|m| m.workspace_id == workspace_id)
        else {
            return Err(GateError::forbidden("not a member of this workspace"));
        };

        if !membership.role.at_least(min_role) {
            return Err(GateError::forbidden(format!(
                "{min_role} role required, caller is {}",
                membership.role
            )));
        }
        Ok(membership)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryMembershipStore;
    use crate::schema::MembershipRowV1;
    use portcullis_core::fixtures;

    fn resolver(store: &InMemoryMembershipStore) -> MembershipResolver {
        MembershipResolver::new(Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn test_list_drops_unresolved_workspaces() {
        let store = InMemoryMembershipStore::new();
        store.insert("user-1", fixtures::membership("ws-1", Role::Owner, 0));
        let mut orphan: MembershipRowV1 = fixtures::membership("ws-gone", Role::Member, 5).into();
        orphan.workspace = None;
        store.insert_row("user-1", orphan);

        let memberships = resolver(&store).list_memberships(&fixtures::user()).await.unwrap();
        assert_eq!(memberships.len(), 1);
        assert_eq!(memberships[0].workspace_id, "ws-1");
    }

    #[tokio::test]
    async fn test_workspace_state() {
        let store = InMemoryMembershipStore::new();
        let r = resolver(&store);
        assert_eq!(r.workspace_state(&fixtures::user()).await, WorkspaceState::None);

        store.insert("user-1", fixtures::membership("ws-1", Role::Owner, 0));
        store.insert("user-1", fixtures::membership("ws-2", Role::Member, 1));
        assert_eq!(r.workspace_state(&fixtures::user()).await, WorkspaceState::Some(2));

        store.set_unavailable(true);
        assert_eq!(r.workspace_state(&fixtures::user()).await, WorkspaceState::Unknown);
    }

    #[tokio::test]
    async fn test_failure_degrades_to_empty_for_rendering() {
        let store = InMemoryMembershipStore::new();
        store.insert("user-1", fixtures::membership("ws-1", Role::Owner, 0));
        store.set_unavailable(true);

        let r = resolver(&store);
        assert!(r.list_memberships_or_empty(&fixtures::user()).await.is_empty());
        assert!(matches!(
            r.list_memberships(&fixtures::user()).await,
            Err(GateError::MembershipQueryFailed { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_a_query_failure() {
        let store = InMemoryMembershipStore::new();
        store.insert("user-1", fixtures::membership("ws-1", Role::Owner, 0));
        store.set_delay(Some(Duration::from_secs(60)));

        let r = resolver(&store).with_timeout(Duration::from_millis(100));
        assert_eq!(r.workspace_state(&fixtures::user()).await, WorkspaceState::Unknown);
    }

    #[tokio::test]
    async fn test_guard() {
        let store = InMemoryMembershipStore::new();
        store.insert("user-1", fixtures::membership("ws-admin", Role::Admin, 0));
        store.insert("user-1", fixtures::membership("ws-viewer", Role::Viewer, 1));
        let guard = WorkspaceGuard::new(resolver(&store));
        let user = fixtures::user();

        let m = guard.require(&user, "ws-admin", Role::Admin).await.unwrap();
        assert_eq!(m.role, Role::Admin);

        let err = guard.require(&user, "ws-viewer", Role::Admin).await.unwrap_err();
        assert!(matches!(err, GateError::Forbidden { .. }));
        assert!(err.to_string().contains("admin role required"));

        let err = guard.require(&user, "ws-other", Role::Viewer).await.unwrap_err();
        assert!(matches!(err, GateError::Forbidden { .. }));

        store.set_unavailable(true);
        let err = guard.require(&user, "ws-admin", Role::Admin).await.unwrap_err();
        assert!(matches!(err, GateError::MembershipQueryFailed { .. }));
    }
}
