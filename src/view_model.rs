use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::actions::{ActionKind, ActionTicket, ActionTracker};
use crate::backend::{BackendError, ScheduleBackend};
use crate::cache::{DateRange, DateRangeCache};
use crate::clock::Clock;
use crate::models::{ClassDefinition, MyClassEntry, ScheduledSession, SessionId, SessionWithClass};
use crate::registration::{RegistrationEvent, RegistrationState};
use crate::task_slot::{TaskSlot, Ticket};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The requested day was already inside the loaded window.
    CacheHit,
    Loaded { count: usize },
    /// A newer request of the same kind took over; nothing was changed.
    Superseded,
    /// No window can be built around the requested day.
    InvalidDate(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed { registered: bool },
    /// Another join or cancel for this session is still running.
    AlreadyPending,
    /// State was reset while the call was running; its result was dropped.
    Discarded,
    Failed(String),
}

#[derive(Debug, Default)]
struct ScheduleState {
    sessions: Vec<SessionWithClass>,
    my_classes: Vec<MyClassEntry>,
    cache: DateRangeCache,
    registrations: RegistrationState,
    actions: ActionTracker,
    sessions_slot: TaskSlot,
    my_classes_slot: TaskSlot,
    error_message: Option<String>,
}

fn lock(state: &Mutex<ScheduleState>) -> MutexGuard<'_, ScheduleState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Cleanup {
    Sessions(Ticket),
    MyClasses(Ticket),
    Action(SessionId, ActionTicket),
}

/// Releases pending markers when an operation's future is dropped before it
/// reaches its own completion step.
struct PendingGuard<'a> {
    state: &'a Mutex<ScheduleState>,
    cleanup: Option<Cleanup>,
}

impl<'a> PendingGuard<'a> {
    fn new(state: &'a Mutex<ScheduleState>, cleanup: Cleanup) -> Self {
        Self {
            state,
            cleanup: Some(cleanup),
        }
    }

    fn disarm(&mut self) {
        self.cleanup = None;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let Some(cleanup) = self.cleanup.take() else {
            return;
        };
        let mut state = lock(self.state);
        match cleanup {
            Cleanup::Sessions(ticket) => {
                state.sessions_slot.complete(ticket);
            }
            Cleanup::MyClasses(ticket) => {
                state.my_classes_slot.complete(ticket);
            }
            Cleanup::Action(id, ticket) => {
                state.actions.finish(id, ticket);
            }
        }
    }
}

/// A session as the front end shows it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionView {
    pub session: ScheduledSession,
    pub class: ClassDefinition,
    pub spots_left: u32,
    pub is_full: bool,
    pub is_registered: bool,
    pub is_joining: bool,
    pub is_cancelling: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScheduleSnapshot {
    #[schema(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    pub loaded_range: Option<DateRange>,
    pub is_loading: bool,
    pub error_message: Option<String>,
    pub sessions: Vec<SessionView>,
}

struct Inner {
    backend: Arc<dyn ScheduleBackend>,
    clock: Arc<dyn Clock>,
    state: Mutex<ScheduleState>,
}

/// Owner of the schedule state for one signed-in user.
///
/// Every mutation happens under one lock that is never held across an
/// await; network calls run outside it and their results are applied only
/// if the operation is still current.
#[derive(Clone)]
pub struct ScheduleViewModel {
    inner: Arc<Inner>,
}

impl ScheduleViewModel {
    pub fn new(
        backend: Arc<dyn ScheduleBackend>,
        clock: Arc<dyn Clock>,
        cache: DateRangeCache,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                clock,
                state: Mutex::new(ScheduleState {
                    cache,
                    ..ScheduleState::default()
                }),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ScheduleState> {
        lock(&self.inner.state)
    }

    pub fn today(&self) -> NaiveDate {
        self.inner.clock.today()
    }

    /// Loads the window around `date` unless it is already cached.
    #[instrument(skip(self))]
    pub async fn load_sessions_for_date(&self, date: NaiveDate) -> LoadOutcome {
        let today = self.inner.clock.today();
        let planned = self.state().cache.plan(date, today);
        match planned {
            Ok(Some(range)) => self.fetch_sessions(range).await,
            Ok(None) => {
                debug!(%date, "date already loaded");
                LoadOutcome::CacheHit
            }
            Err(err) => {
                warn!(error = %err, "requested date rejected");
                LoadOutcome::InvalidDate(err.to_string())
            }
        }
    }

    /// Same as [`Self::load_sessions_for_date`], on a spawned task that aborts
    /// the previously selected one.
    pub fn select_date(&self, date: NaiveDate) -> JoinHandle<LoadOutcome> {
        let view_model = self.clone();
        let handle = tokio::spawn(async move { view_model.load_sessions_for_date(date).await });
        self.state().sessions_slot.attach(handle.abort_handle());
        handle
    }

    /// Replaces the session list with everything in `range`.
    #[instrument(skip(self))]
    pub async fn fetch_sessions(&self, range: DateRange) -> LoadOutcome {
        let ticket = self.state().sessions_slot.begin();
        let mut guard = PendingGuard::new(&self.inner.state, Cleanup::Sessions(ticket));

        tokio::task::yield_now().await;
        let still_current = self.state().sessions_slot.is_current(ticket);
        if !still_current {
            debug!("session fetch superseded before sending");
            return LoadOutcome::Superseded;
        }

        let result = self.inner.backend.sessions_in_range(range).await;

        guard.disarm();
        let mut state = self.state();
        if !state.sessions_slot.complete(ticket) {
            debug!("session fetch superseded, dropping result");
            return LoadOutcome::Superseded;
        }
        match result {
            Ok(sessions) => {
                let count = sessions.len();
                info!(count, start = %range.start, end = %range.end, "sessions loaded");
                state.sessions = sessions;
                state.cache.commit(range);
                state.error_message = None;
                LoadOutcome::Loaded { count }
            }
            Err(err) => fail(&mut state, "session fetch failed", err),
        }
    }

    /// Pulls the user's registrations and reconciles the registration flags.
    #[instrument(skip(self))]
    pub async fn fetch_my_classes(&self) -> LoadOutcome {
        let ticket = self.state().my_classes_slot.begin();
        let mut guard = PendingGuard::new(&self.inner.state, Cleanup::MyClasses(ticket));

        tokio::task::yield_now().await;
        let still_current = self.state().my_classes_slot.is_current(ticket);
        if !still_current {
            return LoadOutcome::Superseded;
        }

        let result = self.inner.backend.my_classes().await;

        guard.disarm();
        let mut state = self.state();
        if !state.my_classes_slot.complete(ticket) {
            debug!("my-classes fetch superseded, dropping result");
            return LoadOutcome::Superseded;
        }
        match result {
            Ok(entries) => {
                let count = entries.len();
                state
                    .registrations
                    .apply(RegistrationEvent::reconciled_from(&entries));
                state.my_classes = entries;
                info!(count, "registrations reconciled");
                LoadOutcome::Loaded { count }
            }
            Err(err) => fail(&mut state, "my-classes fetch failed", err),
        }
    }

    pub fn refresh_my_classes_in_background(&self) -> JoinHandle<LoadOutcome> {
        let view_model = self.clone();
        let handle = tokio::spawn(async move { view_model.fetch_my_classes().await });
        self.state().my_classes_slot.attach(handle.abort_handle());
        handle
    }

    /// Drops the cached window and reloads both sessions and registrations.
    #[instrument(skip(self))]
    pub async fn refresh(&self, date: NaiveDate) -> LoadOutcome {
        {
            let mut state = self.state();
            state.sessions_slot.cancel();
            state.cache.reset();
        }
        let (sessions, _) = futures::join!(
            self.load_sessions_for_date(date),
            self.fetch_my_classes()
        );
        sessions
    }

    pub async fn join_session(&self, id: SessionId) -> ActionOutcome {
        self.run_action(ActionKind::Join, id).await
    }

    pub async fn cancel_registration(&self, id: SessionId) -> ActionOutcome {
        self.run_action(ActionKind::Cancel, id).await
    }

    #[instrument(skip(self))]
    async fn run_action(&self, kind: ActionKind, id: SessionId) -> ActionOutcome {
        let started = self.state().actions.try_start(kind, id);
        let Some(ticket) = started else {
            debug!("action already pending, ignoring");
            return ActionOutcome::AlreadyPending;
        };
        let mut guard = PendingGuard::new(&self.inner.state, Cleanup::Action(id, ticket));

        let result = match kind {
            ActionKind::Join => match self.inner.backend.register(id).await {
                Err(BackendError::AlreadyRegistered) => {
                    info!("session was already registered, treating as joined");
                    Ok(())
                }
                other => other,
            },
            ActionKind::Cancel => self.inner.backend.cancel_registration(id).await,
        };

        guard.disarm();
        let mut state = self.state();
        if !state.actions.finish(id, ticket) {
            debug!("state was reset during action, dropping result");
            return ActionOutcome::Discarded;
        }
        match result {
            Ok(()) => {
                let (event, registered) = match kind {
                    ActionKind::Join => (RegistrationEvent::Joined(id), true),
                    ActionKind::Cancel => (RegistrationEvent::Cancelled(id), false),
                };
                state.registrations.apply(event);
                state.actions.clear_error(id);
                info!(registered, "action completed");
                ActionOutcome::Completed { registered }
            }
            Err(err) => {
                warn!(error = %err, "action failed");
                let message = err.user_message();
                state.actions.record_error(id, message.clone());
                ActionOutcome::Failed(message)
            }
        }
    }

    pub fn is_registered(&self, id: SessionId) -> bool {
        self.state().registrations.is_registered(id)
    }

    pub fn is_joining(&self, id: SessionId) -> bool {
        self.state().actions.is_pending(ActionKind::Join, id)
    }

    pub fn is_cancelling(&self, id: SessionId) -> bool {
        self.state().actions.is_pending(ActionKind::Cancel, id)
    }

    pub fn action_error(&self, id: SessionId) -> Option<String> {
        self.state().actions.error(id).map(str::to_string)
    }

    pub fn clear_action_error(&self, id: SessionId) -> Option<String> {
        self.state().actions.clear_error(id)
    }

    pub fn error_message(&self) -> Option<String> {
        self.state().error_message.clone()
    }

    pub fn loaded_range(&self) -> Option<DateRange> {
        self.state().cache.loaded()
    }

    pub fn is_loading(&self) -> bool {
        self.state().sessions_slot.is_running()
    }

    pub fn sessions(&self) -> Vec<SessionWithClass> {
        self.state().sessions.clone()
    }

    pub fn my_classes(&self) -> Vec<MyClassEntry> {
        self.state().my_classes.clone()
    }

    /// Sessions starting on `date` in the gym's zone, earliest first.
    pub fn sessions_on(&self, date: NaiveDate) -> Vec<SessionWithClass> {
        let state = self.state();
        self.sessions_matching(&state, |item| {
            self.inner.clock.local_date(item.session.start_time) == date
        })
    }

    /// Loaded sessions the user is registered for, earliest first.
    pub fn registered_sessions(&self) -> Vec<SessionWithClass> {
        let state = self.state();
        self.sessions_matching(&state, |item| state.registrations.is_registered(item.id()))
    }

    fn sessions_matching(
        &self,
        state: &ScheduleState,
        keep: impl Fn(&SessionWithClass) -> bool,
    ) -> Vec<SessionWithClass> {
        let mut matching: Vec<_> = state.sessions.iter().filter(|item| keep(item)).cloned().collect();
        matching.sort_by_key(|item| (item.session.start_time, item.id()));
        matching
    }

    pub fn snapshot(&self, date: Option<NaiveDate>) -> ScheduleSnapshot {
        let items = match date {
            Some(date) => self.sessions_on(date),
            None => self.sessions(),
        };
        let state = self.state();
        let sessions = items
            .into_iter()
            .map(|item| {
                let id = item.id();
                SessionView {
                    spots_left: item.spots_left(),
                    is_full: item.is_full(),
                    is_registered: state.registrations.is_registered(id),
                    is_joining: state.actions.is_pending(ActionKind::Join, id),
                    is_cancelling: state.actions.is_pending(ActionKind::Cancel, id),
                    error: state.actions.error(id).map(str::to_string),
                    session: item.session,
                    class: item.class_def,
                }
            })
            .collect();
        ScheduleSnapshot {
            date,
            loaded_range: state.cache.loaded(),
            is_loading: state.sessions_slot.is_running(),
            error_message: state.error_message.clone(),
            sessions,
        }
    }

    /// Forgets everything, e.g. on logout. Running fetches are cancelled and
    /// running actions have their results dropped.
    pub fn reset(&self) {
        let mut state = self.state();
        state.sessions_slot.cancel();
        state.my_classes_slot.cancel();
        state.sessions.clear();
        state.my_classes.clear();
        state.cache.reset();
        state.registrations.apply(RegistrationEvent::Cleared);
        state.actions.clear();
        state.error_message = None;
        info!("schedule state reset");
    }
}

fn fail(state: &mut ScheduleState, context: &str, err: BackendError) -> LoadOutcome {
    warn!(error = %err, "{context}");
    let message = err.user_message();
    state.error_message = Some(message.clone());
    LoadOutcome::Failed(message)
}
