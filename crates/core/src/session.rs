//! In-memory lookup sessions.
//!
//! Each session owns the consumer half of two channels: an unbounded status
//! channel and a oneshot result channel. The worker holds the producer halves
//! (see [`WorkerChannels`]). A pending result always wins over unread status
//! messages when polling, and the session is removed as soon as a terminal
//! state has been reported once.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::console::StatusSender;
use crate::domain::lookup::{LookupOutcome, LookupRequest};

pub const PROCESSING_PLACEHOLDER: &str = "Agent is working...";
pub const WORKER_VANISHED: &str = "lookup worker exited without producing a result";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn from_timestamp(at: DateTime<Utc>) -> Self {
        Self(format!("session_{}", at.timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("session `{0}` not found")]
    NotFound(SessionId),
    #[error("session `{0}` already exists")]
    Duplicate(SessionId),
    #[error("session store is full ({0} live sessions)")]
    AtCapacity(usize),
}

/// Producer side of a session, owned by the background worker.
pub struct WorkerChannels {
    pub status: StatusSender,
    pub result: oneshot::Sender<LookupOutcome>,
    pub cancel: CancellationToken,
}

/// Everything a worker needs to run one session.
pub struct SessionHandle {
    pub session_id: SessionId,
    pub request: LookupRequest,
    pub channels: WorkerChannels,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub customer_id: String,
    pub created_at: DateTime<Utc>,
    pub cancelled: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Processing(String),
    Completed(LookupOutcome),
    Failed(LookupOutcome),
}

impl PollOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing(_))
    }
}

struct SessionEntry {
    customer_id: String,
    created_at: DateTime<Utc>,
    last_polled_at: DateTime<Utc>,
    status_rx: UnboundedReceiver<String>,
    result_rx: oneshot::Receiver<LookupOutcome>,
    cancel: CancellationToken,
}

impl SessionEntry {
    fn summary(&self, session_id: &SessionId) -> SessionSummary {
        SessionSummary {
            session_id: session_id.clone(),
            customer_id: self.customer_id.clone(),
            created_at: self.created_at,
            cancelled: self.cancel.is_cancelled(),
        }
    }
}

pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
    max_live: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limit(usize::MAX)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that refuses new sessions once `max_live` are held.
    pub fn with_limit(max_live: usize) -> Self {
        Self { sessions: Mutex::new(HashMap::new()), max_live }
    }

    pub fn limit(&self) -> usize {
        self.max_live
    }

    pub async fn create(
        &self,
        session_id: SessionId,
        request: LookupRequest,
    ) -> Result<SessionHandle, StoreError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&session_id) {
            return Err(StoreError::Duplicate(session_id));
        }
        if sessions.len() >= self.max_live {
            return Err(StoreError::AtCapacity(self.max_live));
        }

        let (entry, channels) = open_channels(&request);
        sessions.insert(session_id.clone(), entry);
        debug!(event_name = "lookup.session.created", session_id = %session_id, "session created");

        Ok(SessionHandle { session_id, request, channels })
    }

    /// Creates a session under a fresh timestamp-derived id.
    pub async fn allocate(&self, request: LookupRequest) -> Result<SessionHandle, StoreError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.len() >= self.max_live {
            return Err(StoreError::AtCapacity(self.max_live));
        }
        let base = SessionId::from_timestamp(Utc::now());
        let mut session_id = base.clone();
        let mut suffix = 2_u32;
        while sessions.contains_key(&session_id) {
            session_id = SessionId(format!("{base}-{suffix}"));
            suffix += 1;
        }

        let (entry, channels) = open_channels(&request);
        sessions.insert(session_id.clone(), entry);
        debug!(event_name = "lookup.session.created", session_id = %session_id, "session created");

        Ok(SessionHandle { session_id, request, channels })
    }

    pub async fn get(&self, session_id: &SessionId) -> Result<SessionSummary, StoreError> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(session_id)
            .map(|entry| entry.summary(session_id))
            .ok_or_else(|| StoreError::NotFound(session_id.clone()))
    }

    pub async fn contains(&self, session_id: &SessionId) -> bool {
        self.sessions.lock().await.contains_key(session_id)
    }

    pub async fn delete(&self, session_id: &SessionId) -> bool {
        self.sessions.lock().await.remove(session_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Non-blocking: reports the result if one is waiting, otherwise at most one
    /// status message, otherwise the generic placeholder.
    pub async fn poll(&self, session_id: &SessionId) -> Result<PollOutcome, StoreError> {
        let mut sessions = self.sessions.lock().await;
        let entry =
            sessions.get_mut(session_id).ok_or_else(|| StoreError::NotFound(session_id.clone()))?;

        let terminal = match entry.result_rx.try_recv() {
            Ok(outcome) if outcome.is_failure() => Some(PollOutcome::Failed(outcome)),
            Ok(outcome) => Some(PollOutcome::Completed(outcome)),
            Err(oneshot::error::TryRecvError::Closed) => {
                Some(PollOutcome::Failed(LookupOutcome::failed(WORKER_VANISHED, None)))
            }
            Err(oneshot::error::TryRecvError::Empty) => None,
        };

        if let Some(outcome) = terminal {
            sessions.remove(session_id);
            info!(
                event_name = "lookup.session.completed",
                session_id = %session_id,
                failed = matches!(outcome, PollOutcome::Failed(_)),
                "session result delivered"
            );
            return Ok(outcome);
        }

        entry.last_polled_at = Utc::now();
        let message = entry.status_rx.try_recv().unwrap_or_else(|_| PROCESSING_PLACEHOLDER.into());
        Ok(PollOutcome::Processing(message))
    }

    /// Signals the session's worker to stop; the session stays pollable until
    /// the worker reports its terminal state.
    pub async fn cancel(&self, session_id: &SessionId) -> Result<(), StoreError> {
        let sessions = self.sessions.lock().await;
        let entry =
            sessions.get(session_id).ok_or_else(|| StoreError::NotFound(session_id.clone()))?;
        entry.cancel.cancel();
        info!(
            event_name = "lookup.session.cancel_requested",
            session_id = %session_id,
            "cancel requested"
        );
        Ok(())
    }

    /// Drops sessions nobody has polled for `max_age` (counted from creation
    /// for sessions never polled), cancelling any worker still attached.
    /// Queued or slow sessions survive as long as a client keeps polling.
    pub async fn reap_expired(&self, max_age: Duration) -> usize {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now().checked_sub_signed(max_age).unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|session_id, entry| {
            let keep = entry.last_polled_at > cutoff;
            if !keep {
                entry.cancel.cancel();
                debug!(
                    event_name = "lookup.session.reaped",
                    session_id = %session_id,
                    "session abandoned"
                );
            }
            keep
        });
        before - sessions.len()
    }
}

fn open_channels(request: &LookupRequest) -> (SessionEntry, WorkerChannels) {
    let (status_tx, status_rx) = mpsc::unbounded_channel();
    let (result_tx, result_rx) = oneshot::channel();
    let cancel = CancellationToken::new();
    let now = Utc::now();

    let entry = SessionEntry {
        customer_id: request.customer_id.clone(),
        created_at: now,
        last_polled_at: now,
        status_rx,
        result_rx,
        cancel: cancel.clone(),
    };
    let channels = WorkerChannels { status: status_tx, result: result_tx, cancel };
    (entry, channels)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use crate::domain::lookup::{LookupOutcome, LookupRequest};

    use super::{
        PollOutcome, SessionId, SessionStore, StoreError, PROCESSING_PLACEHOLDER, WORKER_VANISHED,
    };

    fn request(customer_id: &str) -> LookupRequest {
        LookupRequest::new(customer_id, "admin", "123").expect("valid request")
    }

    #[tokio::test]
    async fn allocated_ids_are_unique_among_live_sessions() {
        let store = SessionStore::new();
        let mut ids = HashSet::new();
        for index in 0..25 {
            let handle = store.allocate(request(&format!("C{index}"))).await.expect("allocate");
            assert!(handle.session_id.as_str().starts_with("session_"));
            assert!(ids.insert(handle.session_id.clone()), "duplicate id {}", handle.session_id);
            assert!(store.contains(&handle.session_id).await);
        }
        assert_eq!(store.len().await, 25);
    }

    #[tokio::test]
    async fn create_rejects_live_duplicate() {
        let store = SessionStore::new();
        let id = SessionId("session_42".to_string());
        let _handle = store.create(id.clone(), request("C1")).await.expect("first create");

        let error = store.create(id.clone(), request("C2")).await.err().expect("duplicate");
        assert_eq!(error, StoreError::Duplicate(id));
    }

    #[tokio::test]
    async fn new_session_polls_placeholder_then_status_in_order() {
        let store = SessionStore::new();
        let handle = store.allocate(request("C1")).await.expect("allocate");
        let id = handle.session_id.clone();

        assert_eq!(
            store.poll(&id).await.expect("poll"),
            PollOutcome::Processing(PROCESSING_PLACEHOLDER.to_string())
        );

        handle.channels.status.send("one".to_string()).expect("send");
        handle.channels.status.send("two".to_string()).expect("send");

        assert_eq!(store.poll(&id).await.expect("poll"), PollOutcome::Processing("one".into()));
        assert_eq!(store.poll(&id).await.expect("poll"), PollOutcome::Processing("two".into()));
        assert_eq!(
            store.poll(&id).await.expect("poll"),
            PollOutcome::Processing(PROCESSING_PLACEHOLDER.to_string())
        );
    }

    #[tokio::test]
    async fn result_wins_over_unread_status_and_removes_session() {
        let store = SessionStore::new();
        let handle = store.allocate(request("C1")).await.expect("allocate");
        let id = handle.session_id.clone();

        handle.channels.status.send("still unread".to_string()).expect("send");
        let outcome = LookupOutcome::found("C1", "GTBCRM230115001");
        handle.channels.result.send(outcome.clone()).expect("send result");

        assert_eq!(store.poll(&id).await.expect("poll"), PollOutcome::Completed(outcome));
        assert_eq!(store.poll(&id).await, Err(StoreError::NotFound(id.clone())));
        assert_eq!(store.poll(&id).await, Err(StoreError::NotFound(id)));
    }

    #[tokio::test]
    async fn failure_record_is_reported_as_failed() {
        let store = SessionStore::new();
        let handle = store.allocate(request("C1")).await.expect("allocate");
        let id = handle.session_id.clone();

        let outcome = LookupOutcome::failed("Agent error: boom", None);
        handle.channels.result.send(outcome.clone()).expect("send result");

        assert_eq!(store.poll(&id).await.expect("poll"), PollOutcome::Failed(outcome));
        assert!(!store.contains(&id).await);
    }

    #[tokio::test]
    async fn dropped_worker_is_reported_as_failure() {
        let store = SessionStore::new();
        let handle = store.allocate(request("C1")).await.expect("allocate");
        let id = handle.session_id.clone();
        drop(handle);

        match store.poll(&id).await.expect("poll") {
            PollOutcome::Failed(LookupOutcome::Failed { error, .. }) => {
                assert_eq!(error, WORKER_VANISHED)
            }
            other => panic!("unexpected poll outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn full_store_refuses_new_sessions_until_one_is_removed() {
        let store = SessionStore::with_limit(1);
        let first = store.allocate(request("C1")).await.expect("allocate");

        let refused = store.allocate(request("C2")).await.err().expect("store is full");
        assert_eq!(refused, StoreError::AtCapacity(1));

        assert!(store.delete(&first.session_id).await);
        assert!(store.allocate(request("C2")).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let store = SessionStore::new();
        let id = SessionId("session_missing".to_string());

        assert_eq!(store.poll(&id).await, Err(StoreError::NotFound(id.clone())));
        assert_eq!(store.cancel(&id).await, Err(StoreError::NotFound(id.clone())));
        assert!(store.get(&id).await.is_err());
        assert!(!store.delete(&id).await);
    }

    #[tokio::test]
    async fn cancel_trips_the_worker_token() {
        let store = SessionStore::new();
        let handle = store.allocate(request("C1")).await.expect("allocate");

        store.cancel(&handle.session_id).await.expect("cancel");

        assert!(handle.channels.cancel.is_cancelled());
        let summary = store.get(&handle.session_id).await.expect("still live");
        assert!(summary.cancelled);
        assert_eq!(summary.customer_id, "C1");
    }

    #[tokio::test]
    async fn reaping_spares_sessions_that_are_still_polled() {
        let store = SessionStore::new();
        let polled = store.allocate(request("C1")).await.expect("allocate");
        let abandoned = store.allocate(request("C2")).await.expect("allocate");

        // a queued worker: no result yet, client polling well inside the idle window
        for _ in 0..8 {
            tokio::time::sleep(Duration::from_millis(15)).await;
            assert!(matches!(
                store.poll(&polled.session_id).await.expect("still live"),
                PollOutcome::Processing(_)
            ));
            store.reap_expired(Duration::from_millis(60)).await;
        }

        assert!(store.contains(&polled.session_id).await);
        assert!(!polled.channels.cancel.is_cancelled());
        assert!(!store.contains(&abandoned.session_id).await);
        assert!(abandoned.channels.cancel.is_cancelled());

        polled
            .channels
            .result
            .send(LookupOutcome::found("C1", "GTBCRM230115001"))
            .expect("session still holds the receiver");
        assert!(matches!(
            store.poll(&polled.session_id).await.expect("terminal"),
            PollOutcome::Completed(_)
        ));
    }

    #[tokio::test]
    async fn reaping_removes_only_expired_sessions() {
        let store = SessionStore::new();
        let old = store.allocate(request("C1")).await.expect("allocate");

        assert_eq!(store.reap_expired(Duration::from_secs(3600)).await, 0);
        tokio::time::sleep(Duration::from_millis(80)).await;
        let fresh = store.allocate(request("C2")).await.expect("allocate");

        assert_eq!(store.reap_expired(Duration::from_millis(40)).await, 1);
        assert!(old.channels.cancel.is_cancelled());
        assert!(!store.contains(&old.session_id).await);
        assert!(store.contains(&fresh.session_id).await);
    }
}
