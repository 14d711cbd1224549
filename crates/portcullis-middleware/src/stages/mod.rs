//! The gate pipeline's stages, in execution order:
//!
//! 1. [`request_id`] - generate/propagate the request ID
//! 2. [`telemetry`] - time, log and count every request
//! 3. [`gate`] - the single routing decision

pub mod gate;
pub mod request_id;
pub mod telemetry;

pub use gate::{GateMiddleware, GateOutcome};
pub use request_id::{RequestIdMiddleware, REQUEST_ID_HEADER};
pub use telemetry::{RequestSummary, TelemetryMiddleware};
