//! # Shipment naming and batching constants
//!
//! Client and server agree on how combined shipments are labelled: the
//! shipment id is derived from the destination alone, so the same destination
//! always maps to the same id within and across sessions.

use crate::proto::{CombinedShipment, Order};

/// Default number of order ids accepted per batch window.
pub const DEFAULT_BATCH_SIZE: usize = 3;

/// Prefix prepended to a destination to form a combined shipment id.
pub const SHIPMENT_ID_PREFIX: &str = "cmb-";

/// Status label carried by every flushed shipment ("ready to ship").
pub const SHIPMENT_STATUS: &str = "Processed!";

/// Returns the shipment id for `destination`.
pub fn shipment_id(destination: &str) -> String {
    format!("{SHIPMENT_ID_PREFIX}{destination}")
}

impl CombinedShipment {
    /// Starts a shipment for `order`'s destination, seeded with that order.
    pub fn seeded_with(order: Order) -> Self {
        Self {
            id: shipment_id(&order.destination),
            status: SHIPMENT_STATUS.to_string(),
            orders_list: vec![order],
        }
    }
}
