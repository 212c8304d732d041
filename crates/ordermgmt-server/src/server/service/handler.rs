//! gRPC service implementation for order management.
//!
//! This module defines [`OrderService`], the concrete implementation of the
//! [`OrderManagement`] gRPC service. Unary calls go straight to the shared
//! [`OrderStore`]; streaming calls are handed to a spawned task that feeds a
//! bounded response channel.
//!
//! ## Responsibilities
//!
//! - Validate incoming orders and map failures to gRPC statuses.
//! - Spawn one task per `SearchOrders` and `ProcessOrders` call.
//! - Resolve each `ProcessOrders` deadline from the client header and the
//!   configured cap.
//! - Refuse new calls and cancel stragglers during shutdown.

use crate::server::{
    config::ServerConfig,
    service::{deadline::effective_deadline, lifecycle::Lifecycle},
    store::OrderStore,
    streaming::{
        coordinator::{SessionLimits, drive_session},
        search::feed_matches,
        update::{apply_updates, update_confirmation},
    },
    telemetry::{
        increment_orders_added, increment_requests, increment_session_errors,
        record_session_duration,
    },
};
use core::pin::Pin;
use ordermgmt_core::{
    Error,
    proto::{
        CombinedShipment, Confirmation, Order, OrderId, SearchQuery,
        order_management_server::OrderManagement,
    },
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tonic::{Request, Response, Status, Streaming};
use tracing::Instrument;

/// Order management service backed by a shared in-memory store.
///
/// Cloning is cheap: clones share the store and the lifecycle state, which is
/// what tonic needs when it hands the service to each connection.
#[derive(Clone)]
pub struct OrderService {
    config: ServerConfig,
    store: OrderStore,
    lifecycle: Arc<Lifecycle>,
}

impl OrderService {
    pub fn new(config: ServerConfig, store: OrderStore) -> Self {
        Self {
            config,
            store,
            lifecycle: Arc::new(Lifecycle::new()),
        }
    }

    pub const fn store(&self) -> &OrderStore {
        &self.store
    }

    /// Stops admitting calls and drains in-flight ones.
    ///
    /// Sessions still running after the configured shutdown timeout are
    /// cancelled and end with `UNAVAILABLE`.
    pub async fn shutdown(&self) {
        self.lifecycle.shutdown(self.config.shutdown_timeout).await;
    }
}

#[tonic::async_trait]
impl OrderManagement for OrderService {
    type SearchOrdersStream = Pin<Box<dyn Stream<Item = Result<Order, Status>> + Send>>;
    type ProcessOrdersStream = Pin<Box<dyn Stream<Item = Result<CombinedShipment, Status>> + Send>>;

    #[tracing::instrument(skip_all, fields(order_id = %req.get_ref().id))]
    async fn add_order(&self, req: Request<Order>) -> Result<Response<Confirmation>, Status> {
        let _guard = self.lifecycle.enter(false)?;
        increment_requests();

        let order = req.into_inner();
        if order.id.is_empty() {
            return Err(Error::InvalidRequest {
                reason: "Order id must not be empty".to_string(),
            }
            .into());
        }

        let id = order.id.clone();
        if self.store.put(order).is_some() {
            tracing::info!("Order replaced");
        } else {
            tracing::info!("Order added");
        }
        increment_orders_added();

        Ok(Response::new(Confirmation {
            value: format!("Order Added: {id}"),
        }))
    }

    #[tracing::instrument(skip_all, fields(order_id = %req.get_ref().value))]
    async fn get_order(&self, req: Request<OrderId>) -> Result<Response<Order>, Status> {
        let _guard = self.lifecycle.enter(false)?;
        increment_requests();

        let order = self.store.get(&req.get_ref().value).inspect_err(|e| {
            tracing::debug!("{e}");
        })?;
        Ok(Response::new(order))
    }

    #[tracing::instrument(skip_all, fields(query = %req.get_ref().value))]
    async fn search_orders(
        &self,
        req: Request<SearchQuery>,
    ) -> Result<Response<Self::SearchOrdersStream>, Status> {
        let guard = self.lifecycle.enter(true)?;
        increment_requests();

        let matches = self.store.search_items(&req.get_ref().value);
        tracing::debug!(matches = matches.len(), "Search snapshot taken");

        let (resp_tx, resp_rx) = mpsc::channel(self.config.stream_buffer_size);

        let fut = async move {
            let _guard = guard;
            match feed_matches(matches, resp_tx).await {
                Ok(sent) => tracing::debug!(sent, "Search completed"),
                Err(e) => {
                    increment_session_errors();
                    tracing::debug!("Search ended early: {}", e);
                }
            }
        };
        tokio::spawn(fut.instrument(tracing::info_span!("search_orders")));

        Ok(Response::new(Box::pin(ReceiverStream::new(resp_rx))))
    }

    #[tracing::instrument(skip_all)]
    async fn update_orders(
        &self,
        req: Request<Streaming<Order>>,
    ) -> Result<Response<Confirmation>, Status> {
        let _guard = self.lifecycle.enter(true)?;
        increment_requests();

        let ids = apply_updates(req.into_inner(), &self.store)
            .await
            .inspect_err(|e| {
                increment_session_errors();
                tracing::warn!("Update stream failed: {}", e);
            })?;

        tracing::info!(updated = ids.len(), "Update stream completed");
        Ok(Response::new(Confirmation {
            value: update_confirmation(&ids),
        }))
    }

    /// Opens a duplex session batching order ids into combined shipments.
    ///
    /// The session runs on its own task inside a `process_orders` span and
    /// writes to a channel of `stream_buffer_size` messages; the returned
    /// stream drains that channel.
    #[tracing::instrument(skip_all)]
    async fn process_orders(
        &self,
        req: Request<Streaming<OrderId>>,
    ) -> Result<Response<Self::ProcessOrdersStream>, Status> {
        let guard = self.lifecycle.enter(true)?;
        increment_requests();
        let start = std::time::Instant::now();

        let limits = SessionLimits {
            batch_size: self.config.batch_size,
            deadline: effective_deadline(req.metadata(), self.config.max_session),
            shutdown: self.lifecycle.token(),
        };
        let span = tracing::info_span!(
            "process_orders",
            batch_size = limits.batch_size,
            deadline_ms = limits.deadline.map(|d| d.as_millis() as u64),
        );

        let (resp_tx, resp_rx) = mpsc::channel(self.config.stream_buffer_size);
        let inbound = req.into_inner();
        let store = self.store.clone();

        let fut = async move {
            let _guard = guard;
            match drive_session(inbound, store, resp_tx, limits).await {
                Ok(summary) => {
                    record_session_duration(start.elapsed().as_millis() as f64);
                    tracing::info!(
                        received = summary.received,
                        shipments = summary.shipments,
                        "Session completed"
                    );
                }
                Err(e) => {
                    increment_session_errors();
                    tracing::warn!("Session ended: {}", e);
                }
            }
        };
        tokio::spawn(fut.instrument(span));

        Ok(Response::new(Box::pin(ReceiverStream::new(resp_rx))))
    }
}
