//! Per-destination shipment batching for the `ProcessOrders` stream.

mod batcher;

pub use batcher::ShipmentBatcher;
