//! Error types for the order management service.
//!
//! This module defines the central `Error` enum covering every failure the
//! store, the shipment batcher and the streaming sessions can report. It
//! implements `From<Error>` for `tonic::Status` so handlers can propagate
//! failures to clients with `?` and an appropriate status code.
//!
//! ## Error Cases
//! - `OrderNotFound`: a lookup hit an identifier that was never stored.
//! - `UnknownOrder`: an identifier in the `ProcessOrders` stream did not
//!   resolve to a stored order.
//! - `InvalidRequest`: the client request was malformed.
//! - `Transport`: the inbound half of a stream failed.
//! - `RequestCancelled` / `DeadlineExceeded`: the call was aborted.
//! - `ServiceShutdown`: a request arrived while the service was shutting down.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the order management service.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// No order is stored under `id`.
    #[error("Order does not exist: {id}")]
    OrderNotFound { id: String },

    /// A streamed order id could not be resolved while batching shipments.
    #[error("Unknown order id in shipment stream: {id}")]
    UnknownOrder { id: String },

    /// The client request was invalid.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The inbound half of a stream reported a failure.
    #[error("Transport fault: {0}")]
    Transport(Status),

    /// The client aborted the request.
    #[error("Request cancelled by client")]
    RequestCancelled,

    /// The session outlived its deadline.
    #[error("Session deadline exceeded")]
    DeadlineExceeded,

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::OrderNotFound { id } => {
                Status::not_found(format!("Order does not exist: {id}"))
            }
            Error::UnknownOrder { id } => {
                Status::invalid_argument(format!("Order id {id} does not resolve to an order"))
            }
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::Transport(status) => status,
            Error::RequestCancelled => Status::cancelled("Request was cancelled"),
            Error::DeadlineExceeded => Status::deadline_exceeded("Session deadline exceeded"),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn maps_errors_to_status_codes() {
        let cases = [
            (Error::OrderNotFound { id: "7".into() }, Code::NotFound),
            (Error::UnknownOrder { id: "7".into() }, Code::InvalidArgument),
            (
                Error::InvalidRequest {
                    reason: "empty id".into(),
                },
                Code::InvalidArgument,
            ),
            (Error::RequestCancelled, Code::Cancelled),
            (Error::DeadlineExceeded, Code::DeadlineExceeded),
            (Error::ServiceShutdown, Code::Unavailable),
        ];

        for (err, code) in cases {
            assert_eq!(Status::from(err).code(), code);
        }
    }

    #[test]
    fn transport_fault_keeps_original_status() {
        let status = Status::aborted("stream reset");
        let mapped = Status::from(Error::Transport(status));
        assert_eq!(mapped.code(), Code::Aborted);
        assert_eq!(mapped.message(), "stream reset");
    }

    #[test]
    fn not_found_message_names_the_id() {
        let status = Status::from(Error::OrderNotFound { id: "404".into() });
        assert!(status.message().contains("404"));
    }
}
