//! Tracking of in-flight calls and coordinated shutdown.
//!
//! Every RPC takes a [`CallGuard`] from the shared [`Lifecycle`] before doing
//! any work. Once shutdown starts, new guards are refused, in-flight calls get
//! a bounded window to finish, and whatever is still running is then
//! cancelled through the [`CancellationToken`] handed to streaming sessions.

use crate::server::telemetry::{decrement_sessions_inflight, increment_sessions_inflight};
use core::time::Duration;
use ordermgmt_core::{Error, Result};
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub struct Lifecycle {
    inflight: AtomicUsize,
    shutting_down: AtomicBool,
    token: CancellationToken,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`] once [`shutdown`](Self::shutdown)
    /// has been initiated.
    pub fn enter(self: &Arc<Self>, streaming: bool) -> Result<CallGuard> {
        // Count first, then check: paired with the store-then-load in
        // `shutdown`, either the drain sees this call or this call sees the
        // flag.
        self.inflight.fetch_add(1, Ordering::SeqCst);
        if self.is_shutting_down() {
            self.inflight.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::ServiceShutdown);
        }
        if streaming {
            increment_sessions_inflight();
        }
        Ok(CallGuard {
            lifecycle: Arc::clone(self),
            streaming,
        })
    }

    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::SeqCst)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Token cancelled once the drain window is over.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stops admitting calls, waits up to `drain_timeout` for in-flight calls
    /// to finish, then cancels whatever remains.
    pub async fn shutdown(&self, drain_timeout: Duration) {
        tracing::info!("Refusing new requests");
        self.shutting_down.store(true, Ordering::SeqCst);

        tracing::info!("Draining in-flight calls ({} active)", self.inflight());
        let drained = timeout(drain_timeout, async {
            while self.inflight() > 0 {
                sleep(Duration::from_millis(100)).await;
            }
        })
        .await;

        match drained {
            Ok(()) => tracing::debug!("All in-flight calls drained"),
            Err(_) => tracing::warn!(
                "Graceful drain timed out ({} calls still active)",
                self.inflight()
            ),
        }

        tracing::debug!("Cancelling remaining sessions via shutdown token");
        self.token.cancel();
    }
}

/// Marks one call as in flight until dropped.
#[derive(Debug)]
pub struct CallGuard {
    lifecycle: Arc<Lifecycle>,
    streaming: bool,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.lifecycle.inflight.fetch_sub(1, Ordering::SeqCst);
        if self.streaming {
            decrement_sessions_inflight();
        }
    }
}
