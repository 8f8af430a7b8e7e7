//! Listing view state as a single reducer plus a subscription list.
//!
//! [`reduce`] is pure: `(State, &Action) -> State`. [`Store`] owns the current state, runs
//! the reducer, and tells subscribers what changed.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::params::{FilterKey, FilterParams};
use crate::types::{ErrorSlot, ListingResponse, Pager};

/// Identifier of one issued listing request. Strictly increasing per component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RequestId(pub u64);

#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Edit one filter. Non-page edits reset the page.
    SetFilter { key: FilterKey, value: String },
    /// Replace the whole parameter set (e.g. decoded from a shared URL).
    ReplaceParams(FilterParams),
    RequestStarted(RequestId),
    RequestSucceeded { id: RequestId, response: ListingResponse },
    RequestFailed { id: RequestId, error: ErrorSlot },
    /// A superseded request was aborted. Never surfaces as an error.
    RequestAborted(RequestId),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    /// The request succeeded with zero items.
    Empty,
    Failed,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct State {
    pub params: FilterParams,
    pub items: Vec<Value>,
    pub error: Option<ErrorSlot>,
    pub pager: Pager,
    pub active_request: Option<RequestId>,
    pub status: ViewStatus,
}

impl State {
    pub fn with_params(params: FilterParams) -> Self {
        let pager = Pager { page: params.page_number(), ..Pager::default() };
        Self { params, pager, ..Self::default() }
    }

    pub fn is_loading(&self) -> bool {
        self.status == ViewStatus::Loading
    }
}

/// Apply one action to the state.
pub fn reduce(mut state: State, action: &Action) -> State {
    match action {
        Action::SetFilter { key, value } => {
            state.params.update(*key, value.clone());
            state.pager.page = state.params.page_number();
        }
        Action::ReplaceParams(params) => {
            state.params = params.clone();
            state.pager.page = state.params.page_number();
        }
        Action::RequestStarted(id) => {
            state.active_request = Some(*id);
            state.status = ViewStatus::Loading;
        }
        Action::RequestSucceeded { id, response } => {
            if state.active_request != Some(*id) {
                debug!(request = id.0, "Discarding stale listing response");
                return state;
            }
            state.active_request = None;
            state.error = None;
            state.items = response.items.clone();
            state.pager = Pager {
                page: response.page.unwrap_or_else(|| state.params.page_number()),
                total_pages: response.total_pages,
                total_items: response.total_items,
            };
            state.status =
                if state.items.is_empty() { ViewStatus::Empty } else { ViewStatus::Loaded };
        }
        Action::RequestFailed { id, error } => {
            if state.active_request != Some(*id) {
                debug!(request = id.0, "Discarding stale listing failure");
                return state;
            }
            state.active_request = None;
            state.items.clear();
            state.error = Some(error.clone());
            state.status = ViewStatus::Failed;
        }
        Action::RequestAborted(id) => {
            if state.active_request == Some(*id) {
                state.active_request = None;
                state.status = if state.error.is_some() {
                    ViewStatus::Failed
                } else if state.items.is_empty() {
                    ViewStatus::Idle
                } else {
                    ViewStatus::Loaded
                };
            }
        }
    }
    state
}

// ---------------------------------------------------------------------------
// Store + subscriptions
// ---------------------------------------------------------------------------

/// What subscribers are told after each store update.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StoreEvent {
    /// The search box asked for a search. No payload; read the current params.
    SearchRequested,
    ParamsModified { key: FilterKey, value: String },
    RequestStarted { id: RequestId },
    ResultsChanged { count: usize },
    ErrorShown { error: ErrorSlot },
}

/// Handle returned by [`Store::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&State, &StoreEvent) + Send>;

#[derive(Default)]
pub struct Store {
    state: State,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
}

impl Store {
    pub fn new(state: State) -> Self {
        Self { state, subscribers: Vec::new(), next_subscription: 0 }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn subscribe(
        &mut self,
        subscriber: impl FnMut(&State, &StoreEvent) + Send + 'static,
    ) -> SubscriptionId {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// Run the reducer and notify subscribers. Returns the events that were emitted.
    pub fn dispatch(&mut self, action: Action) -> Vec<StoreEvent> {
        let previous = std::mem::take(&mut self.state);
        let next = reduce(previous.clone(), &action);
        let events = diff_events(&previous, &next, &action);
        self.state = next;
        for event in &events {
            self.notify(event);
        }
        events
    }

    /// Emit an event that does not change state.
    pub fn emit(&mut self, event: StoreEvent) {
        self.notify(&event);
    }

    fn notify(&mut self, event: &StoreEvent) {
        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber(&self.state, event);
        }
    }
}

fn diff_events(previous: &State, next: &State, action: &Action) -> Vec<StoreEvent> {
    let mut events: Vec<StoreEvent> = previous
        .params
        .diff(&next.params)
        .into_iter()
        .map(|key| StoreEvent::ParamsModified { key, value: next.params.get(key).to_string() })
        .collect();

    if next.active_request.is_some() && next.active_request != previous.active_request {
        if let Some(id) = next.active_request {
            events.push(StoreEvent::RequestStarted { id });
        }
    }
    if next.error != previous.error {
        if let Some(error) = &next.error {
            events.push(StoreEvent::ErrorShown { error: error.clone() });
        }
    }
    // Aborts settle the request too, but leave the listing as it was.
    let completed = matches!(action, Action::RequestSucceeded { .. } | Action::RequestFailed { .. })
        && previous.active_request.is_some()
        && next.active_request.is_none();
    if completed || next.items != previous.items {
        events.push(StoreEvent::ResultsChanged { count: next.items.len() });
    }
    events
}
