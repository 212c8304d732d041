use crate::server::store::OrderStore;
use ordermgmt_core::{
    Error, Result,
    proto::{CombinedShipment, Order},
};
use std::collections::HashMap;

/// Groups streamed order ids into per-destination [`CombinedShipment`]s.
///
/// A batcher owns one batch window: the count of ids accepted since the last
/// flush plus the shipments accumulated during that window. The window is
/// bounded by `batch_size`; [`push`](Self::push) flushes it the moment it
/// fills, so [`window_count`](Self::window_count) never exceeds the bound.
///
/// A batcher belongs to exactly one `ProcessOrders` session and is never
/// shared, so it needs no synchronization of its own. Orders are resolved
/// through the shared [`OrderStore`].
#[derive(Debug)]
pub struct ShipmentBatcher {
    store: OrderStore,
    batch_size: usize,
    window: usize,
    // Shipments in first-arrival order of their destination.
    shipments: Vec<CombinedShipment>,
    by_destination: HashMap<String, usize>,
}

impl ShipmentBatcher {
    /// Creates an empty batcher flushing every `batch_size` accepted ids.
    ///
    /// A `batch_size` of 0 is treated as 1.
    pub fn new(store: OrderStore, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            window: 0,
            shipments: Vec::new(),
            by_destination: HashMap::new(),
        }
    }

    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of ids accepted since the last flush.
    pub const fn window_count(&self) -> usize {
        self.window
    }

    /// Returns `true` once the window has reached the batch size.
    pub const fn is_full(&self) -> bool {
        self.window >= self.batch_size
    }

    /// Number of shipments currently accumulated.
    pub fn pending_shipments(&self) -> usize {
        self.shipments.len()
    }

    /// Counts `id` against the window and adds its order to the shipment for
    /// its destination, creating that shipment if needed.
    ///
    /// The window advances even when `id` does not resolve. Callers must check
    /// [`is_full`](Self::is_full) afterwards; [`push`](Self::push) does this.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOrder`] if no order is stored under `id`. No
    /// shipment is created for it.
    pub fn accept(&mut self, id: &str) -> Result<()> {
        self.window += 1;

        let order = self.store.get(id).map_err(|e| match e {
            Error::OrderNotFound { id } => Error::UnknownOrder { id },
            other => other,
        })?;

        self.append(order);
        Ok(())
    }

    /// Accepts `id` and flushes the window if that filled it.
    ///
    /// Returns the flushed shipments when the threshold was reached, or `None`
    /// while the window is still open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOrder`] if `id` does not resolve. If that id
    /// completed the window, the window is still flushed (keeping the bound)
    /// and its shipments are dropped with the error.
    pub fn push(&mut self, id: &str) -> Result<Option<Vec<CombinedShipment>>> {
        let accepted = self.accept(id);
        let flushed = self.is_full().then(|| self.flush());
        accepted.map(|()| flushed)
    }

    /// Takes every accumulated shipment and resets the window.
    ///
    /// Flushing an empty window returns an empty `Vec`.
    pub fn flush(&mut self) -> Vec<CombinedShipment> {
        self.window = 0;
        self.by_destination.clear();
        std::mem::take(&mut self.shipments)
    }

    fn append(&mut self, order: Order) {
        match self.by_destination.get(&order.destination) {
            Some(&idx) => self.shipments[idx].orders_list.push(order),
            None => {
                self.by_destination
                    .insert(order.destination.clone(), self.shipments.len());
                self.shipments.push(CombinedShipment::seeded_with(order));
            }
        }
    }
}
