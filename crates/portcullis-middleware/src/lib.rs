//! # Portcullis Middleware
//!
//! The fixed-order pipeline every request passes through before it reaches
//! the application.
//!
//! ## Pipeline Stages
//!
//! ```text
//! Request → RequestId → Telemetry → Gate ─ passthrough ─▶ Handler
//!                                     │
//!                                     └─ redirect (302) ─▶ Response
//! ```
//!
//! | Stage | Middleware | Purpose                                          |
//! |-------|------------|--------------------------------------------------|
//! | 1     | Request ID | Generate/propagate request ID (UUID v7)          |
//! | 2     | Telemetry  | Latency histogram and a log line per request     |
//! | 3     | Gate       | Asset/public short-circuit, locale, session, routing |
//!
//! The gate's cookie mutations (locale default, provider session refreshes)
//! are written onto whatever response comes back, exactly once.
//!
//! ## Example
//!
//! ```
//! use portcullis_middleware::pipeline::Stage;
//!
//! let stages = Stage::all();
//! assert_eq!(stages.len(), 3);
//! assert_eq!(stages[0].name(), "request_id");
//! assert_eq!(stages[2].name(), "gate");
//! ```

#![doc(html_root_url = "https://docs.rs/portcullis-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod middleware;
pub mod pipeline;
pub mod stages;
pub mod types;

// Re-export main types at crate root
pub use context::MiddlewareContext;
pub use middleware::{BoxFuture, Middleware, Next};
pub use pipeline::{Pipeline, PipelineBuilder, Stage};
pub use stages::{GateMiddleware, GateOutcome, RequestIdMiddleware, TelemetryMiddleware};
pub use types::{Request, Response, ResponseExt};
