use super::session::{SessionSummary, ShipmentSender, StreamSession};
use crate::server::{shipment::ShipmentBatcher, store::OrderStore};
use core::{future::Future, time::Duration};
use futures::Stream;
use ordermgmt_core::{Error, proto::OrderId};
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// How long a terminal status may wait for outbound capacity.
pub const TERMINAL_STATUS_GRACE: Duration = Duration::from_secs(1);

/// Limits applied to one `ProcessOrders` session.
#[derive(Clone, Debug)]
pub struct SessionLimits {
    /// Ids accepted per batch window.
    pub batch_size: usize,
    /// Lifetime of the session, measured from its start.
    pub deadline: Option<Duration>,
    /// Cancelled when the service stops serving in-flight streams.
    pub shutdown: CancellationToken,
}

/// Runs one `ProcessOrders` session to completion.
///
/// This function owns the session lifecycle: it builds a fresh
/// [`ShipmentBatcher`] for the call, drives the [`StreamSession`] over
/// `inbound`, and races it against the session deadline and the service
/// shutdown token.
///
/// # Arguments
///
/// - `inbound`: The client's half of the duplex call.
/// - `store`: Shared order store used to resolve ids.
/// - `resp_tx`: Channel feeding the gRPC response stream.
/// - `limits`: Batch size, deadline and shutdown token.
///
/// # Behavior
///
/// - On success the client sees every shipment followed by an `OK` status
///   when `resp_tx` is dropped.
/// - On failure the partial batch is discarded and the error is forwarded as
///   the final status, unless the client is already gone.
/// - A deadline or shutdown abandons both halves at once: the session future
///   is dropped mid-flight.
pub async fn drive_session<S>(
    inbound: S,
    store: OrderStore,
    resp_tx: ShipmentSender,
    limits: SessionLimits,
) -> ordermgmt_core::Result<SessionSummary>
where
    S: Stream<Item = Result<OrderId, Status>>,
{
    let batcher = ShipmentBatcher::new(store, limits.batch_size);
    let mut session = StreamSession::new(batcher, resp_tx.clone());

    let outcome = {
        let run = with_deadline(limits.deadline, session.run(inbound));
        tokio::select! {
            res = run => res,
            () = limits.shutdown.cancelled() => Err(Error::ServiceShutdown),
        }
    };

    if let Err(e) = &outcome {
        session.close();

        if matches!(e, Error::RequestCancelled) {
            tracing::debug!("Client went away mid-session");
        } else {
            forward_terminal_status(&resp_tx, e).await;
        }
    }

    outcome
}

/// Queues `err` as the last message of the call.
///
/// A client that stopped reading keeps the outbound buffer full, so the send
/// waits at most [`TERMINAL_STATUS_GRACE`]. Dropping `resp_tx` afterwards ends
/// the call either way.
async fn forward_terminal_status(resp_tx: &ShipmentSender, err: &Error) {
    let send = resp_tx.send(Err(err.clone().into()));
    match tokio::time::timeout(TERMINAL_STATUS_GRACE, send).await {
        Ok(Ok(())) => {}
        Ok(Err(send_err)) => {
            // The original error is still returned for accounting.
            tracing::warn!("Failed to forward session error: {}", send_err);
        }
        Err(_) => {
            tracing::warn!("Client is not reading, dropping session error: {}", err);
        }
    }
}

async fn with_deadline<F>(
    deadline: Option<Duration>,
    fut: F,
) -> ordermgmt_core::Result<SessionSummary>
where
    F: Future<Output = ordermgmt_core::Result<SessionSummary>>,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .unwrap_or(Err(Error::DeadlineExceeded)),
        None => fut.await,
    }
}
