// ── Request status tracker ──
//
// One entry per command identifier, created on first dispatch and never
// removed. Every transition overwrites the previous one and rebuilds the
// snapshot that subscribers receive.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::trace;

use crate::model::{RequestState, RequestStatus};

/// Full request-status map as seen by subscribers.
pub type RequestSnapshot = Arc<BTreeMap<String, RequestStatus>>;

/// Pending / successful / failed status per named command.
///
/// Transitions are non-blocking and infallible. Names are independent of
/// each other; concurrent dispatches of the same name are not serialized
/// and the last transition wins.
pub struct RequestTracker {
    by_name: DashMap<String, RequestStatus>,
    snapshot: watch::Sender<RequestSnapshot>,
}

impl RequestTracker {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(BTreeMap::new()));
        Self {
            by_name: DashMap::new(),
            snapshot,
        }
    }

    // ── Transitions (controller only) ────────────────────────────────

    /// Mark `name` in flight. Clears any previous error.
    pub(crate) fn begin(&self, name: &str) {
        self.set(name, RequestState::Pending, None);
    }

    pub(crate) fn succeed(&self, name: &str) {
        self.set(name, RequestState::Successful, None);
    }

    pub(crate) fn fail(&self, name: &str, message: impl Into<String>) {
        self.set(name, RequestState::Failed, Some(message.into()));
    }

    // ── Read access ──────────────────────────────────────────────────

    /// Current status of `name`; [`RequestState::Idle`] if never dispatched.
    pub fn status(&self, name: &str) -> RequestStatus {
        self.by_name
            .get(name)
            .map_or_else(|| RequestStatus::idle(name), |r| r.value().clone())
    }

    pub fn snapshot(&self) -> RequestSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RequestSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn set(&self, name: &str, state: RequestState, error_message: Option<String>) {
        trace!(request = name, %state, "request status");
        self.by_name.insert(
            name.to_owned(),
            RequestStatus {
                name: name.to_owned(),
                state,
                error_message,
            },
        );
        self.rebuild_snapshot();
    }

    fn rebuild_snapshot(&self) {
        let map: BTreeMap<String, RequestStatus> = self
            .by_name
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(map));
    }
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new()
    }
}
