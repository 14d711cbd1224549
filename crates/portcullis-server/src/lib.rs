//! # Portcullis Server
//!
//! Hosts the gate pipeline on hyper:
//!
//! - `GET /health`, `GET /ready` outside the gate
//! - `GET|POST /api/cron/process-queue`, the scheduled trigger
//! - `DELETE /api/workflows/{id}?workspace_id=`, admin only
//! - everything else through the gate to the application handler
//!
//! Collaborator clients are built once from [`PortcullisConfig`] and shared by
//! every connection. Shutdown stops accepting, flips readiness, and drains.
//!
//! [`PortcullisConfig`]: portcullis_config::PortcullisConfig

#![doc(html_root_url = "https://docs.rs/portcullis-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod app;
pub mod cron;
pub mod error;
pub mod health;
pub mod server;
pub mod shutdown;
pub mod workflows;

pub use app::App;
pub use cron::SchedulerTrigger;
pub use error::ServerError;
pub use health::{HealthCheck, HealthStatus, ReadinessCheck, ReadinessStatus};
pub use server::Server;
pub use shutdown::ShutdownSignal;
pub use workflows::WorkflowEndpoint;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
