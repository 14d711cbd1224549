//! Portcullis Identity - identity provider collaborator
//!
//! The gate never interprets session cookies itself. It hands the inbound
//! cookie set to an [`IdentityProvider`] and gets back the current user plus
//! any cookies the provider wants set on the response.
//!
//! # Architecture
//!
//! ```text
//!    inbound Cookie header
//!            │
//!   ┌────────▼─────────┐   current_user()   ┌──────────────────────┐
//!   │ SessionVerifier  │───────────────────▶│ IdentityProvider     │
//!   │ (bounded wait)   │◀───────────────────│ (HTTP / in-memory)   │
//!   └────────┬─────────┘  user + Set-Cookie └──────────────────────┘
//!            │
//!            ▼
//!   Session { user, cookies, failure }
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use portcullis_core::fixtures;
//! use portcullis_identity::{InMemoryIdentityProvider, SessionVerifier};
//!
//! # tokio_test::block_on(async {
//! let provider = InMemoryIdentityProvider::new();
//! provider.insert_session("tok", fixtures::user());
//!
//! let verifier = SessionVerifier::new(Arc::new(provider));
//! let session = verifier
//!     .verify(&fixtures::context("/app", "portcullis-session=tok"))
//!     .await;
//! assert!(session.is_authenticated());
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod memory;
pub mod provider;
pub mod verifier;

pub use error::{IdentityError, IdentityResult};
pub use memory::InMemoryIdentityProvider;
pub use provider::{HttpIdentityProvider, IdentityProvider};
pub use verifier::{Session, SessionVerifier, DEFAULT_PROVIDER_TIMEOUT};
