//! Streaming call implementations.
//!
//! - [`session`] - The `ProcessOrders` duplex state machine.
//! - [`coordinator`] - Runs a session under its deadline and the service
//!   shutdown token, surfacing the terminal status to the client.
//! - [`search`] - Feeds `SearchOrders` matches into the response stream.
//! - [`update`] - Applies a `UpdateOrders` client stream to the store.

pub mod coordinator;
pub mod search;
pub mod session;
pub mod update;
