use std::collections::HashMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::models::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Join,
    Cancel,
}

/// Identifies one started action, so a late finish cannot release a newer
/// action on the same session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionTicket(u64);

#[derive(Debug, Clone, Copy)]
struct InFlight {
    kind: ActionKind,
    ticket: ActionTicket,
}

/// In-flight join/cancel calls and the last error per session.
#[derive(Debug, Default)]
pub struct ActionTracker {
    in_flight: HashMap<SessionId, InFlight>,
    errors: HashMap<SessionId, String>,
    issued: u64,
}

impl ActionTracker {
    pub fn is_pending(&self, kind: ActionKind, id: SessionId) -> bool {
        self.in_flight
            .get(&id)
            .is_some_and(|action| action.kind == kind)
    }

    pub fn is_busy(&self, id: SessionId) -> bool {
        self.in_flight.contains_key(&id)
    }

    /// Marks `id` as pending. Returns `None`, changing nothing, while any
    /// action for the session is still in flight.
    pub fn try_start(&mut self, kind: ActionKind, id: SessionId) -> Option<ActionTicket> {
        if self.is_busy(id) {
            return None;
        }
        self.issued += 1;
        let ticket = ActionTicket(self.issued);
        self.in_flight.insert(id, InFlight { kind, ticket });
        Some(ticket)
    }

    /// Releases `id` if `ticket` still owns it. Returns false after
    /// [`Self::clear`] or once a newer action took the session over.
    pub fn finish(&mut self, id: SessionId, ticket: ActionTicket) -> bool {
        match self.in_flight.get(&id) {
            Some(action) if action.ticket == ticket => {
                self.in_flight.remove(&id);
                true
            }
            _ => false,
        }
    }

    pub fn record_error(&mut self, id: SessionId, message: impl Into<String>) {
        self.errors.insert(id, message.into());
    }

    pub fn clear_error(&mut self, id: SessionId) -> Option<String> {
        self.errors.remove(&id)
    }

    pub fn error(&self, id: SessionId) -> Option<&str> {
        self.errors.get(&id).map(String::as_str)
    }

    /// Forgets pending actions and errors. Tickets keep counting up.
    pub fn clear(&mut self) {
        self.in_flight.clear();
        self.errors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_and_finish() {
        let mut tracker = ActionTracker::default();
        let ticket = tracker.try_start(ActionKind::Join, 42).unwrap();
        assert!(tracker.is_pending(ActionKind::Join, 42));
        assert!(!tracker.is_pending(ActionKind::Cancel, 42));
        assert!(tracker.finish(42, ticket));
        assert!(!tracker.is_busy(42));
        assert!(!tracker.finish(42, ticket));
    }

    #[test]
    fn test_second_start_on_busy_session_is_refused() {
        let mut tracker = ActionTracker::default();
        assert!(tracker.try_start(ActionKind::Join, 42).is_some());
        assert_eq!(tracker.try_start(ActionKind::Join, 42), None);
        assert_eq!(tracker.try_start(ActionKind::Cancel, 42), None);
        assert!(tracker.try_start(ActionKind::Cancel, 43).is_some());
        assert!(tracker.is_pending(ActionKind::Join, 42));
        assert!(tracker.is_pending(ActionKind::Cancel, 43));
    }

    #[test]
    fn test_stale_ticket_does_not_release_newer_action() {
        let mut tracker = ActionTracker::default();
        let stale = tracker.try_start(ActionKind::Join, 42).unwrap();
        tracker.clear();
        let current = tracker.try_start(ActionKind::Join, 42).unwrap();
        assert_ne!(stale, current);

        assert!(!tracker.finish(42, stale));
        assert!(tracker.is_pending(ActionKind::Join, 42));
        assert!(tracker.finish(42, current));
        assert!(!tracker.is_busy(42));
    }

    #[test]
    fn test_errors_are_per_session() {
        let mut tracker = ActionTracker::default();
        tracker.record_error(1, "Session is full");
        assert_eq!(tracker.error(1), Some("Session is full"));
        assert_eq!(tracker.error(2), None);
        assert_eq!(tracker.clear_error(1).as_deref(), Some("Session is full"));
        assert_eq!(tracker.error(1), None);
    }
}
