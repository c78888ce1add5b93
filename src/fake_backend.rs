use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use http::StatusCode;
use tokio::sync::Notify;

use crate::backend::{BackendError, ScheduleBackend};
use crate::cache::DateRange;
use crate::models::{MyClassEntry, SessionId, SessionWithClass};

#[derive(Debug, Clone)]
pub enum FakeFailure {
    Unauthenticated,
    AlreadyRegistered,
    Server(String),
}

impl From<FakeFailure> for BackendError {
    fn from(value: FakeFailure) -> Self {
        match value {
            FakeFailure::Unauthenticated => BackendError::Unauthenticated,
            FakeFailure::AlreadyRegistered => BackendError::AlreadyRegistered,
            FakeFailure::Server(detail) => BackendError::Server {
                status: StatusCode::BAD_REQUEST,
                detail,
            },
        }
    }
}

/// Holds the next backend call until released.
#[derive(Clone, Default)]
pub struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[derive(Default)]
pub struct FakeBackend {
    sessions: Mutex<Vec<SessionWithClass>>,
    scripted_sessions: Mutex<VecDeque<Result<Vec<SessionWithClass>, FakeFailure>>>,
    my_classes: Mutex<Vec<MyClassEntry>>,
    register_failures: Mutex<HashMap<SessionId, FakeFailure>>,
    range_calls: Mutex<Vec<DateRange>>,
    gate: Mutex<Option<Gate>>,
    pub my_classes_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn set_sessions(&self, sessions: Vec<SessionWithClass>) {
        *self.sessions.lock().unwrap() = sessions;
    }

    /// Queues a one-off answer for the next range fetch.
    pub fn script_sessions(&self, response: Result<Vec<SessionWithClass>, FakeFailure>) {
        self.scripted_sessions.lock().unwrap().push_back(response);
    }

    pub fn set_my_classes(&self, entries: Vec<MyClassEntry>) {
        *self.my_classes.lock().unwrap() = entries;
    }

    pub fn fail_register(&self, id: SessionId, failure: FakeFailure) {
        self.register_failures.lock().unwrap().insert(id, failure);
    }

    pub fn clear_register_failures(&self) {
        self.register_failures.lock().unwrap().clear();
    }

    pub fn range_calls(&self) -> Vec<DateRange> {
        self.range_calls.lock().unwrap().clone()
    }

    pub fn gate_next_call(&self) -> Gate {
        let gate = Gate::default();
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    async fn pass_gate(&self) {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
    }
}

#[async_trait]
impl ScheduleBackend for FakeBackend {
    async fn sessions_in_range(
        &self,
        range: DateRange,
    ) -> Result<Vec<SessionWithClass>, BackendError> {
        self.range_calls.lock().unwrap().push(range);
        let scripted = self.scripted_sessions.lock().unwrap().pop_front();
        self.pass_gate().await;
        match scripted {
            Some(response) => response.map_err(BackendError::from),
            None => Ok(self.sessions.lock().unwrap().clone()),
        }
    }

    async fn my_classes(&self) -> Result<Vec<MyClassEntry>, BackendError> {
        self.my_classes_calls.fetch_add(1, Ordering::SeqCst);
        let entries = self.my_classes.lock().unwrap().clone();
        self.pass_gate().await;
        Ok(entries)
    }

    async fn register(&self, id: SessionId) -> Result<(), BackendError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        let failure = self.register_failures.lock().unwrap().get(&id).cloned();
        self.pass_gate().await;
        match failure {
            Some(failure) => Err(failure.into()),
            None => Ok(()),
        }
    }

    async fn cancel_registration(&self, _id: SessionId) -> Result<(), BackendError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        Ok(())
    }
}
