use crate::server::{store::OrderStore, telemetry::increment_orders_updated};
use futures::{Stream, StreamExt};
use ordermgmt_core::{Error, proto::Order};
use tonic::Status;

/// Replaces each streamed order in `store` until the client closes its half.
///
/// Orders are applied as they arrive; an order is visible to other callers as
/// soon as it has been read. Returns the updated ids in arrival order.
///
/// # Errors
///
/// - [`Error::InvalidRequest`] for an order with an empty id. Orders read
///   before it stay applied.
/// - [`Error::Transport`] if the inbound stream fails.
pub async fn apply_updates<S>(inbound: S, store: &OrderStore) -> ordermgmt_core::Result<Vec<String>>
where
    S: Stream<Item = Result<Order, Status>>,
{
    let mut inbound = core::pin::pin!(inbound);
    let mut updated = Vec::new();

    while let Some(next) = inbound.next().await {
        let order = next.map_err(Error::Transport)?;
        if order.id.is_empty() {
            return Err(Error::InvalidRequest {
                reason: "Order id must not be empty".to_string(),
            });
        }

        tracing::info!(order_id = %order.id, "Order updated");
        updated.push(order.id.clone());
        store.put(order);
        increment_orders_updated();
    }

    Ok(updated)
}

/// Builds the confirmation text returned by `UpdateOrders`.
pub fn update_confirmation(ids: &[String]) -> String {
    format!("Orders processed Updated Order IDs : {}", ids.join(", "))
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: &str, destination: &str) -> Order {
        Order {
            id: id.into(),
            items: vec!["Google Pixel 3A".into()],
            destination: destination.into(),
            price: 1100.0,
        }
    }

    #[tokio::test]
    async fn applies_updates_in_order() {
        let store = OrderStore::new();
        store.seed_sample_orders();

        let inbound = tokio_stream::iter(vec![
            Ok(order("102", "Mountain View, CA")),
            Ok(order("103", "San Jose, CA")),
            Ok(order("102", "Palo Alto, CA")),
        ]);
        let ids = apply_updates(inbound, &store).await.unwrap();

        assert_eq!(ids, vec!["102", "103", "102"]);
        assert_eq!(store.get("102").unwrap().destination, "Palo Alto, CA");
        assert_eq!(store.get("103").unwrap().destination, "San Jose, CA");
        assert_eq!(
            update_confirmation(&ids[..2]),
            "Orders processed Updated Order IDs : 102, 103"
        );
    }

    #[tokio::test]
    async fn empty_id_is_rejected_after_earlier_updates() {
        let store = OrderStore::new();
        let inbound = tokio_stream::iter(vec![Ok(order("1", "a")), Ok(order("", "b"))]);

        let err = apply_updates(inbound, &store).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest { .. }));
        assert!(store.get("1").is_ok());
    }

    #[tokio::test]
    async fn inbound_fault_is_propagated() {
        let store = OrderStore::new();
        let inbound = tokio_stream::iter(vec![Err(Status::cancelled("gone"))]);

        let err = apply_updates(inbound, &store).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn empty_update_confirmation() {
        assert_eq!(update_confirmation(&[]), "Orders processed Updated Order IDs :");
    }
}
