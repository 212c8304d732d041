//! gRPC service implementation and call lifecycle.
//!
//! ## Structure
//!
//! - [`handler`] - gRPC service entry point (`OrderService`).
//! - [`lifecycle`] - In-flight call tracking and graceful shutdown.
//! - [`deadline`] - Resolution of per-session deadlines.

pub mod deadline;
pub mod handler;
pub mod lifecycle;
