//! Portcullis Membership - workspace membership collaborator
//!
//! Answers two questions for the gate: does the caller belong to any
//! workspace, and what role do they hold in a given one.
//!
//! ```text
//!   SessionUser ──▶ MembershipResolver ──▶ MembershipStore (HTTP / in-memory)
//!                    │        │                 │
//!                    │        │                 └─ Vec<MembershipRowV1>
//!                    │        └─ workspace_state() -> None | Some(n) | Unknown
//!                    └─ WorkspaceGuard::require(workspace, min_role)
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use portcullis_core::{fixtures, Role, WorkspaceState};
//! use portcullis_membership::{InMemoryMembershipStore, MembershipResolver};
//!
//! # tokio_test::block_on(async {
//! let store = InMemoryMembershipStore::new();
//! store.insert("user-1", fixtures::membership("ws-1", Role::Owner, 0));
//!
//! let resolver = MembershipResolver::new(Arc::new(store));
//! let state = resolver.workspace_state(&fixtures::user()).await;
//! assert_eq!(state, WorkspaceState::Some(1));
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod memory;
pub mod resolver;
pub mod schema;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryMembershipStore;
pub use resolver::{MembershipResolver, WorkspaceGuard, DEFAULT_MEMBERSHIP_TIMEOUT};
pub use schema::{MembershipRowV1, WorkspaceRowV1};
pub use store::{HttpMembershipStore, MembershipStore};
