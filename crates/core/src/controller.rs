//! One listing component: filter panel, debounced keyword box, pager, and the
//! dispatch-and-cancel request flow, all driving a single [`Store`].
//!
//! Lock order is store, then dispatcher. Completions take the same order, so a response
//! cannot be applied before the store has recorded that its request started.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::debounce::{Debouncer, Key, SubmissionToken};
use crate::dispatch::{Backend, Dispatcher};
use crate::error::FetchError;
use crate::params::{FilterKey, FilterParams};
use crate::query;
use crate::store::{Action, RequestId, State, Store, StoreEvent, SubscriptionId};
use crate::types::ListingResponse;

struct Inner {
    store: Mutex<Store>,
    dispatcher: Mutex<Dispatcher>,
    backend: Arc<dyn Backend>,
    /// Text currently in the keyword box; copied into the params on submit.
    keyword_draft: Mutex<String>,
    debouncer: Debouncer,
}

/// Cheap to clone; all clones drive the same component.
#[derive(Clone)]
pub struct ListingController {
    inner: Arc<Inner>,
}

impl ListingController {
    pub fn new(backend: Arc<dyn Backend>, params: FilterParams, debounce: Duration) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let on_submit = weak.clone();
            let keyword = params.get(FilterKey::Keyword).to_string();
            Inner {
                store: Mutex::new(Store::new(State::with_params(params))),
                dispatcher: Mutex::new(Dispatcher::new()),
                backend,
                keyword_draft: Mutex::new(keyword),
                debouncer: Debouncer::new(debounce, move || {
                    if let Some(inner) = on_submit.upgrade() {
                        inner.search_requested();
                    }
                }),
            }
        });
        Self { inner }
    }

    /// Build a controller whose initial filters come from a shared query string.
    pub fn from_query(backend: Arc<dyn Backend>, query_string: &str, debounce: Duration) -> Self {
        Self::new(backend, query::decode(query_string), debounce)
    }

    /// Snapshot of the current view state.
    pub fn state(&self) -> State {
        self.inner.store.lock().state().clone()
    }

    pub fn params(&self) -> FilterParams {
        self.inner.store.lock().state().params.clone()
    }

    /// Current filters as a shareable query string.
    pub fn query_string(&self) -> String {
        query::encode(&self.inner.store.lock().state().params)
    }

    /// Subscribers run while the store is locked and must not call back into the controller.
    pub fn subscribe(
        &self,
        subscriber: impl FnMut(&State, &StoreEvent) + Send + 'static,
    ) -> SubscriptionId {
        self.inner.store.lock().subscribe(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.store.lock().unsubscribe(id)
    }

    /// Fetch the listing for the current params (initial load or manual refresh).
    pub fn load(&self) -> RequestId {
        self.inner.refresh()
    }

    /// A keystroke in the keyword box. `text` is the box content after the key.
    pub fn type_keyword(&self, text: &str, key: &Key) -> SubmissionToken {
        *self.inner.keyword_draft.lock() = text.to_string();
        self.inner.debouncer.queue_submit(key)
    }

    /// Search button: submit the keyword box on the next tick.
    pub fn submit(&self) -> SubmissionToken {
        self.inner.debouncer.submit()
    }

    /// Dropdown/checkbox change. Non-page filters reset the page. Issues a request
    /// only when the params actually changed.
    pub fn set_filter(&self, key: FilterKey, value: &str) -> Option<RequestId> {
        if key == FilterKey::Keyword {
            self.inner.debouncer.cancel();
            *self.inner.keyword_draft.lock() = value.to_string();
        }
        self.inner.apply(Action::SetFilter { key, value: value.to_string() })
    }

    /// Jump to a page. Leaves all other filters untouched.
    pub fn set_page(&self, page: u32) -> Option<RequestId> {
        self.inner.apply(Action::SetFilter { key: FilterKey::Page, value: page.to_string() })
    }

    pub fn next_page(&self) -> Option<RequestId> {
        let next = self.inner.store.lock().state().pager.next_page()?;
        self.set_page(next)
    }

    pub fn prev_page(&self) -> Option<RequestId> {
        let prev = self.inner.store.lock().state().pager.prev_page()?;
        self.set_page(prev)
    }

    /// Replace every filter at once (e.g. navigating to a shared link).
    pub fn replace_params(&self, params: FilterParams) -> Option<RequestId> {
        self.inner.debouncer.cancel();
        *self.inner.keyword_draft.lock() = params.get(FilterKey::Keyword).to_string();
        self.inner.apply(Action::ReplaceParams(params))
    }

    /// Drop the pending debounce timer and abort the in-flight request.
    pub fn cancel(&self) {
        self.inner.debouncer.cancel();
        let mut store = self.inner.store.lock();
        let aborted = self.inner.dispatcher.lock().cancel();
        if let Some(id) = aborted {
            store.dispatch(Action::RequestAborted(id));
        }
    }
}

impl Inner {
    fn search_requested(self: &Arc<Self>) {
        self.store.lock().emit(StoreEvent::SearchRequested);
        let keyword = self.keyword_draft.lock().clone();
        debug!(keyword = keyword.as_str(), "Search requested");
        let id = {
            let mut store = self.store.lock();
            store.dispatch(Action::SetFilter { key: FilterKey::Keyword, value: keyword });
            self.refresh_locked(&mut store)
        };
        debug!(request = id.0, "Search dispatched");
    }

    fn apply(self: &Arc<Self>, action: Action) -> Option<RequestId> {
        let mut store = self.store.lock();
        let events = store.dispatch(action);
        let modified = events.iter().any(|e| matches!(e, StoreEvent::ParamsModified { .. }));
        if !modified {
            return None;
        }
        Some(self.refresh_locked(&mut store))
    }

    fn refresh(self: &Arc<Self>) -> RequestId {
        let mut store = self.store.lock();
        self.refresh_locked(&mut store)
    }

    fn refresh_locked(self: &Arc<Self>, store: &mut Store) -> RequestId {
        let params = store.state().params.clone();
        let backend = Arc::clone(&self.backend);
        let weak = Arc::downgrade(self);

        let dispatched = self.dispatcher.lock().dispatch(move |id| async move {
            let result = backend.fetch(&params).await;
            if let Some(inner) = weak.upgrade() {
                inner.complete(id, result);
            }
        });

        if let Some(aborted) = dispatched.aborted {
            store.dispatch(Action::RequestAborted(aborted));
        }
        store.dispatch(Action::RequestStarted(dispatched.id));
        dispatched.id
    }

    fn complete(&self, id: RequestId, result: Result<ListingResponse, FetchError>) {
        let mut store = self.store.lock();
        self.dispatcher.lock().finish(id);
        match result.and_then(ListingResponse::into_result) {
            Ok(response) => {
                debug!(request = id.0, items = response.items.len(), "Listing loaded");
                store.dispatch(Action::RequestSucceeded { id, response });
            }
            Err(err) => {
                warn!(request = id.0, error = %err, "Listing request failed");
                store.dispatch(Action::RequestFailed { id, error: err.to_slot() });
            }
        }
    }
}
