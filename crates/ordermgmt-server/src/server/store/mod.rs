//! Shared in-memory order store.
//!
//! [`OrderStore`] is the single source of truth for every operation. One
//! instance is created at startup and cloned into each component that needs
//! it; clones share the same map. Every access takes the lock for exactly one
//! operation, so no caller ever observes a half-applied write and no lock is
//! held across an `await` point.

mod seed;

use ordermgmt_core::{Error, Result, proto::Order};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Cloneable handle to the shared `id -> Order` map.
#[derive(Clone, Default, Debug)]
pub struct OrderStore {
    orders: Arc<RwLock<HashMap<String, Order>>>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `order`, replacing any order stored under the same id.
    ///
    /// Returns the replaced order, if any.
    pub fn put(&self, order: Order) -> Option<Order> {
        self.orders.write().insert(order.id.clone(), order)
    }

    /// Returns the current order stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OrderNotFound`] if no order was ever stored under `id`.
    pub fn get(&self, id: &str) -> Result<Order> {
        self.orders
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::OrderNotFound { id: id.to_string() })
    }

    /// Returns every order with at least one item matching `predicate`.
    ///
    /// The result is a snapshot taken under a single read lock; each order
    /// appears at most once, in map iteration order.
    pub fn search<P>(&self, mut predicate: P) -> Vec<Order>
    where
        P: FnMut(&str) -> bool,
    {
        self.orders
            .read()
            .values()
            .filter(|order| order.items.iter().any(|item| predicate(item)))
            .cloned()
            .collect()
    }

    /// Returns every order with an item containing `query` as a substring.
    pub fn search_items(&self, query: &str) -> Vec<Order> {
        self.search(|item| item.contains(query))
    }

    pub fn len(&self) -> usize {
        self.orders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.read().is_empty()
    }
}
