//! Server-side components of the order management service.
//!
//! ## Submodules
//!
//! - [`config`] - CLI/environment configuration.
//! - [`store`] - The shared, lock-guarded order store.
//! - [`shipment`] - Per-destination shipment batching.
//! - [`streaming`] - Duplex session state machine and stream feeders.
//! - [`service`] - The `OrderManagement` gRPC service and its lifecycle.
//! - [`telemetry`] - Logging and optional OpenTelemetry export.

pub mod config;
pub mod service;
pub mod shipment;
pub mod store;
pub mod streaming;
pub mod telemetry;
