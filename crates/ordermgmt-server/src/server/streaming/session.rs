//! # `ProcessOrders` duplex session
//!
//! A [`StreamSession`] reads order ids from the inbound half of one duplex
//! call, batches them through its own [`ShipmentBatcher`] and writes combined
//! shipments to the outbound half, a bounded channel drained by the gRPC
//! response body.
//!
//! ## States
//!
//! - [`SessionState::Open`] - receiving ids; a full window is flushed
//!   immediately, one outbound message per shipment.
//! - [`SessionState::Draining`] - the client closed its half; the remainder
//!   is flushed even if the window is not full.
//! - [`SessionState::Closed`] - terminal. Reached after the final flush, or
//!   directly on any error, in which case the unflushed partial batch is
//!   dropped.
//!
//! Shipments are only emitted once every id of their window was accepted. The
//! session owns its batching state exclusively: the read loop is the only
//! writer, and outbound sends apply back-pressure by awaiting channel
//! capacity.

use crate::server::{
    shipment::ShipmentBatcher,
    telemetry::{increment_shipments_emitted, record_orders_per_shipment},
};
use futures::{Stream, StreamExt};
use ordermgmt_core::{
    Error, Result,
    proto::{CombinedShipment, OrderId},
};
use tokio::sync::mpsc;
use tonic::Status;

/// Outbound half of a `ProcessOrders` call.
pub type ShipmentSender = mpsc::Sender<core::result::Result<CombinedShipment, Status>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Draining,
    Closed,
}

/// Counters describing a finished session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Order ids read from the client.
    pub received: usize,
    /// Flushes performed, including the final (possibly empty) one.
    pub flushes: usize,
    /// Shipments delivered to the outbound channel.
    pub shipments: usize,
}

enum Event {
    Inbound(Option<core::result::Result<OrderId, Status>>),
    CallerGone,
}

pub struct StreamSession {
    batcher: ShipmentBatcher,
    resp_tx: ShipmentSender,
    state: SessionState,
    summary: SessionSummary,
}

impl StreamSession {
    pub fn new(batcher: ShipmentBatcher, resp_tx: ShipmentSender) -> Self {
        Self {
            batcher,
            resp_tx,
            state: SessionState::Open,
            summary: SessionSummary::default(),
        }
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    pub const fn summary(&self) -> SessionSummary {
        self.summary
    }

    /// Drives the session until the client closes its half or an error
    /// occurs.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownOrder`] for an id that does not resolve (the session
    ///   stops at the first one).
    /// - [`Error::Transport`] if the inbound stream fails.
    /// - [`Error::RequestCancelled`] if the client stops reading responses.
    ///
    /// On error the session is [`SessionState::Closed`] and the pending
    /// partial batch is discarded. Nothing is sent for the error itself;
    /// reporting it is left to the caller.
    pub async fn run<S>(&mut self, inbound: S) -> Result<SessionSummary>
    where
        S: Stream<Item = core::result::Result<OrderId, Status>>,
    {
        let mut inbound = core::pin::pin!(inbound);

        while self.state == SessionState::Open {
            let event = tokio::select! {
                biased;
                () = self.resp_tx.closed() => Event::CallerGone,
                next = inbound.next() => Event::Inbound(next),
            };

            let step = match event {
                Event::Inbound(Some(Ok(OrderId { value }))) => self.on_order_id(&value).await,
                Event::Inbound(Some(Err(status))) => Err(Error::Transport(status)),
                Event::Inbound(None) => self.drain().await,
                Event::CallerGone => Err(Error::RequestCancelled),
            };

            if let Err(e) = step {
                self.close();
                return Err(e);
            }
        }

        Ok(self.summary)
    }

    /// Moves to [`SessionState::Closed`], dropping any unflushed shipments.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        let discarded = self.batcher.flush();
        if !discarded.is_empty() {
            tracing::debug!(
                discarded = discarded.len(),
                "Dropping partial batch of closed session"
            );
        }
        self.state = SessionState::Closed;
    }

    async fn on_order_id(&mut self, id: &str) -> Result<()> {
        self.summary.received += 1;
        tracing::debug!(order_id = id, "Reading order id");

        if let Some(batch) = self.batcher.push(id)? {
            self.summary.flushes += 1;
            self.emit(batch).await?;
        }
        Ok(())
    }

    async fn drain(&mut self) -> Result<()> {
        self.state = SessionState::Draining;
        tracing::debug!(
            window = self.batcher.window_count(),
            "Client closed input, flushing remainder"
        );

        let remainder = self.batcher.flush();
        self.summary.flushes += 1;
        self.emit(remainder).await?;

        self.state = SessionState::Closed;
        Ok(())
    }

    async fn emit(&mut self, batch: Vec<CombinedShipment>) -> Result<()> {
        for shipment in batch {
            let orders = shipment.orders_list.len();
            tracing::info!(shipment = %shipment.id, orders, "Shipping");

            if self.resp_tx.send(Ok(shipment)).await.is_err() {
                return Err(Error::RequestCancelled);
            }

            self.summary.shipments += 1;
            increment_shipments_emitted();
            record_orders_per_shipment(orders as f64);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::store::OrderStore;
    use ordermgmt_core::proto::Order;

    fn store() -> OrderStore {
        let store = OrderStore::new();
        for (id, destination) in [
            ("101", "Mountain View, CA"),
            ("102", "shenzhen"),
            ("103", "shenzhen"),
            ("104", "shenzhen"),
            ("105", "changsha"),
        ] {
            store.put(Order {
                id: id.into(),
                items: vec![],
                destination: destination.into(),
                price: 1.0,
            });
        }
        store
    }

    fn order_ids(ids: &[&str]) -> Vec<core::result::Result<OrderId, Status>> {
        ids.iter()
            .map(|id| Ok(OrderId { value: id.to_string() }))
            .collect()
    }

    type ShipmentReceiver = mpsc::Receiver<core::result::Result<CombinedShipment, Status>>;

    fn session(batch_size: usize, capacity: usize) -> (StreamSession, ShipmentReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        let batcher = ShipmentBatcher::new(store(), batch_size);
        (StreamSession::new(batcher, tx), rx)
    }

    fn drain_rx(rx: &mut ShipmentReceiver) -> Vec<CombinedShipment> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn full_window_then_remainder() {
        let (mut session, mut rx) = session(3, 16);
        let inbound = tokio_stream::iter(order_ids(&["102", "103", "104", "101"]));

        let summary = session.run(inbound).await.unwrap();

        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(
            summary,
            SessionSummary {
                received: 4,
                flushes: 2,
                shipments: 2,
            }
        );

        let shipments = drain_rx(&mut rx);
        assert_eq!(shipments.len(), 2);
        assert_eq!(shipments[0].id, "cmb-shenzhen");
        let ids: Vec<_> = shipments[0].orders_list.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["102", "103", "104"]);
        assert_eq!(shipments[1].id, "cmb-Mountain View, CA");
        assert_eq!(shipments[1].orders_list.len(), 1);
        assert_eq!(shipments[1].orders_list[0].id, "101");
    }

    #[tokio::test]
    async fn short_stream_flushes_once_at_end() {
        let (mut session, mut rx) = session(3, 16);
        let inbound = tokio_stream::iter(order_ids(&["102", "105"]));

        let summary = session.run(inbound).await.unwrap();

        assert_eq!(summary.flushes, 1);
        let shipments = drain_rx(&mut rx);
        assert_eq!(shipments.len(), 2);
        assert!(shipments.iter().all(|s| s.orders_list.len() == 1));
    }

    #[tokio::test]
    async fn empty_stream_emits_nothing() {
        let (mut session, mut rx) = session(3, 4);
        let summary = session.run(tokio_stream::iter(order_ids(&[]))).await.unwrap();

        assert_eq!(summary.flushes, 1);
        assert_eq!(summary.shipments, 0);
        assert!(drain_rx(&mut rx).is_empty());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn unknown_id_stops_session() {
        let (mut session, mut rx) = session(3, 16);
        let inbound = tokio_stream::iter(order_ids(&["102", "103", "104", "105", "nope", "101"]));

        let err = session.run(inbound).await.unwrap_err();

        assert!(matches!(err, Error::UnknownOrder { ref id } if id == "nope"));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.summary().received, 5);
        // Only the completed first window was delivered; 105 was discarded.
        let shipments = drain_rx(&mut rx);
        assert_eq!(shipments.len(), 1);
        assert_eq!(shipments[0].id, "cmb-shenzhen");
        assert!(shipments.iter().all(|s| !s.id.is_empty() && s.id != "cmb-"));
    }

    #[tokio::test]
    async fn inbound_fault_discards_partial_batch() {
        let (mut session, mut rx) = session(3, 16);
        let mut items = order_ids(&["102", "103"]);
        items.push(Err(Status::aborted("connection reset")));
        items.extend(order_ids(&["104"]));

        let err = session.run(tokio_stream::iter(items)).await.unwrap_err();

        match err {
            Error::Transport(status) => assert_eq!(status.code(), tonic::Code::Aborted),
            other => panic!("expected transport fault, got {other:?}"),
        }
        assert!(drain_rx(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn dropped_receiver_cancels_session() {
        let (mut session, rx) = session(1, 1);
        drop(rx);

        let err = session
            .run(tokio_stream::iter(order_ids(&["102", "103"])))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RequestCancelled));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn flush_waits_for_outbound_capacity() {
        let (mut session, mut rx) = session(1, 1);
        let inbound = tokio_stream::iter(order_ids(&["102", "105", "101"]));

        let run = tokio::spawn(async move { session.run(inbound).await });

        let mut received = Vec::new();
        while let Some(msg) = rx.recv().await {
            received.push(msg.unwrap().id);
        }

        let summary = run.await.unwrap().unwrap();
        assert_eq!(summary.shipments, 3);
        assert_eq!(
            received,
            vec!["cmb-shenzhen", "cmb-changsha", "cmb-Mountain View, CA"]
        );
    }
}
