use std::collections::HashMap;

use crate::models::{MyClassEntry, SessionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationEvent {
    /// A join call succeeded, or the server said we were already in.
    Joined(SessionId),
    /// A cancel-registration call succeeded.
    Cancelled(SessionId),
    /// Authoritative listing from the server. Ids missing here keep their value.
    Reconciled(Vec<(SessionId, bool)>),
    Cleared,
}

impl RegistrationEvent {
    pub fn reconciled_from(entries: &[MyClassEntry]) -> Self {
        RegistrationEvent::Reconciled(
            entries
                .iter()
                .map(|entry| (entry.session_id, entry.is_registered()))
                .collect(),
        )
    }
}

/// Per-session "is the current user registered" flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationState {
    flags: HashMap<SessionId, bool>,
}

impl RegistrationState {
    pub fn apply(&mut self, event: RegistrationEvent) {
        match event {
            RegistrationEvent::Joined(id) => {
                self.flags.insert(id, true);
            }
            RegistrationEvent::Cancelled(id) => {
                self.flags.insert(id, false);
            }
            RegistrationEvent::Reconciled(entries) => self.flags.extend(entries),
            RegistrationEvent::Cleared => self.flags.clear(),
        }
    }

    pub fn is_registered(&self, id: SessionId) -> bool {
        self.flags.get(&id).copied().unwrap_or(false)
    }
}
