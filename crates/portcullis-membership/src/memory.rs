//! In-memory membership store for tests and local development.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use portcullis_core::{Membership, SessionUser};

use crate::error::{StoreError, StoreResult};
use crate::schema::MembershipRowV1;
use crate::store::MembershipStore;

#[derive(Debug, Default)]
struct State {
    rows: HashMap<String, Vec<MembershipRowV1>>,
    workflows: HashSet<(String, String)>,
}

/// Membership store backed by per-user row lists.
///
/// Cloning shares state. Rows are returned sorted by `created_at`, mirroring
/// the ordering the HTTP store requests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMembershipStore {
    state: Arc<RwLock<State>>,
    calls: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
    delay: Arc<RwLock<Option<Duration>>>,
}

impl InMemoryMembershipStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resolved membership for `user_id`.
    pub fn insert(&self, user_id: impl Into<String>, membership: Membership) {
        self.insert_row(user_id, membership.into());
    }

    /// Adds a raw row, including rows whose workspace did not resolve.
    pub fn insert_row(&self, user_id: impl Into<String>, row: MembershipRowV1) {
        let mut state = self.state.write();
        let rows = state.rows.entry(user_id.into()).or_default();
        rows.push(row);
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    }

    /// Registers a workflow so it can be deleted.
    pub fn insert_workflow(&self, workspace_id: impl Into<String>, workflow_id: impl Into<String>) {
        self.state
            .write()
            .workflows
            .insert((workspace_id.into(), workflow_id.into()));
    }

    /// Returns `true` if the workflow still exists.
    pub fn has_workflow(&self, workspace_id: &str, workflow_id: &str) -> bool {
        self.state
            .read()
            .workflows
            .contains(&(workspace_id.to_string(), workflow_id.to_string()))
    }

    /// Makes every call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delays every membership query.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write() = delay;
    }

    /// Number of membership queries served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    async fn memberships(&self, user: &SessionUser) -> StoreResult<Vec<MembershipRowV1>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_available()?;
        Ok(self.state.read().rows.get(&user.id).cloned().unwrap_or_default())
    }

    async fn delete_workflow(
        &self,
        _user: &SessionUser,
        workspace_id: &str,
        workflow_id: &str,
    ) -> StoreResult<()> {
        self.check_available()?;
        self.state
            .write()
            .workflows
            .remove(&(workspace_id.to_string(), workflow_id.to_string()));
        Ok(())
    }
}
