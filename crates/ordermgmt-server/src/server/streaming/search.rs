use crate::server::telemetry::increment_search_matches;
use ordermgmt_core::{Error, proto::Order};
use tokio::sync::mpsc;
use tonic::Status;

/// Streams a search snapshot to the client, one order per message.
///
/// `matches` is taken from the store up front, so the client sees one
/// consistent view regardless of concurrent writes. Sends wait for buffer
/// capacity, pacing the feed to the client.
///
/// Returns the number of orders delivered.
///
/// # Errors
///
/// Returns [`Error::RequestCancelled`] if the client stops reading before the
/// snapshot is exhausted.
pub async fn feed_matches(
    matches: Vec<Order>,
    resp_tx: mpsc::Sender<Result<Order, Status>>,
) -> ordermgmt_core::Result<usize> {
    let mut sent = 0;

    for order in matches {
        let id = order.id.clone();
        if resp_tx.send(Ok(order)).await.is_err() {
            return Err(Error::RequestCancelled);
        }
        tracing::debug!(order_id = %id, "Matching order found");
        increment_search_matches();
        sent += 1;
    }

    Ok(sent)
}
