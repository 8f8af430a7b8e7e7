//! Dispatch-and-cancel: one in-flight listing request per component.
//!
//! Issuing a request first aborts whatever the same [`Dispatcher`] still has in flight,
//! then spawns the replacement. Aborted tasks never report back, so a superseded response
//! cannot land on top of a newer one.

use std::future::Future;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::FetchError;
use crate::params::FilterParams;
use crate::store::RequestId;
use crate::types::ListingResponse;

/// Where listing pages come from. Implemented over HTTP by `crashdesk-http`.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn fetch(&self, params: &FilterParams) -> Result<ListingResponse, FetchError>;
}

struct InFlight {
    id: RequestId,
    handle: JoinHandle<()>,
}

/// Outcome of [`Dispatcher::dispatch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dispatched {
    pub id: RequestId,
    /// The request that was still pending and got aborted, if any.
    pub aborted: Option<RequestId>,
}

#[derive(Default)]
pub struct Dispatcher {
    last_id: u64,
    in_flight: Option<InFlight>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort the pending request (if any), then spawn `make(id)` as the new one.
    pub fn dispatch<F, Fut>(&mut self, make: F) -> Dispatched
    where
        F: FnOnce(RequestId) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let aborted = self.cancel();
        self.last_id += 1;
        let id = RequestId(self.last_id);
        let handle = tokio::spawn(make(id));
        debug!(request = id.0, aborted = ?aborted.map(|a| a.0), "Dispatched listing request");
        self.in_flight = Some(InFlight { id, handle });
        Dispatched { id, aborted }
    }

    /// Abort the pending request. Returns its id if it had not finished yet.
    pub fn cancel(&mut self) -> Option<RequestId> {
        let in_flight = self.in_flight.take()?;
        if in_flight.handle.is_finished() {
            return None;
        }
        in_flight.handle.abort();
        debug!(request = in_flight.id.0, "Aborted superseded listing request");
        Some(in_flight.id)
    }

    /// Mark `id` as complete. Ignored if a newer request has replaced it.
    pub fn finish(&mut self, id: RequestId) {
        if self.active() == Some(id) {
            self.in_flight = None;
        }
    }

    pub fn active(&self) -> Option<RequestId> {
        self.in_flight.as_ref().map(|f| f.id)
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn new_request_aborts_pending_one() {
        let completed = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = Dispatcher::new();

        let c = Arc::clone(&completed);
        let first = dispatcher.dispatch(move |_| async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(first.aborted, None);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let c = Arc::clone(&completed);
        let second = dispatcher.dispatch(move |_| async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            c.fetch_add(10, Ordering::SeqCst);
        });
        assert_eq!(second.aborted, Some(first.id));
        assert!(second.id > first.id);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn finished_request_is_not_reported_as_aborted() {
        let mut dispatcher = Dispatcher::new();
        let first = dispatcher.dispatch(|_| async {});
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = dispatcher.dispatch(|_| async {});
        assert_eq!(second.aborted, None);
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn finish_ignores_stale_ids() {
        let mut dispatcher = Dispatcher::new();
        let first = dispatcher.dispatch(|_| std::future::pending::<()>());
        let second = dispatcher.dispatch(|_| std::future::pending::<()>());
        dispatcher.finish(first.id);
        assert_eq!(dispatcher.active(), Some(second.id));
        dispatcher.finish(second.id);
        assert_eq!(dispatcher.active(), None);
    }
}
