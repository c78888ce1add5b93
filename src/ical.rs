use icalendar::{Calendar, Component, Event, EventLike};

use crate::models::SessionWithClass;

/// Renders registered sessions as an iCalendar feed.
#[derive(Clone)]
pub struct ICalExporter {
    calendar_name: String,
}

impl ICalExporter {
    pub fn new(calendar_name: impl Into<String>) -> Self {
        Self {
            calendar_name: calendar_name.into(),
        }
    }

    pub fn generate(&self, sessions: &[SessionWithClass]) -> Vec<u8> {
        if sessions.is_empty() {
            return Vec::new();
        }

        let mut calendar = Calendar::new();
        calendar.name(&self.calendar_name);

        for item in sessions {
            let session = &item.session;
            let mut event = Event::new();
            event.summary(&item.class_def.name);
            event.starts(session.start_time);
            event.ends(session.end_time);
            if let Some(room) = &session.room {
                event.location(room);
            }

            let mut description = format!(
                "Level: {:?}\nParticipants: {}/{}",
                item.class_def.difficulty_level,
                session.current_participants,
                item.effective_capacity()
            );
            if let Some(details) = &item.class_def.description {
                description.push('\n');
                description.push_str(details);
            }
            event.description(&description);
            event.uid(&format!("session-{}-gym-schedule-client", session.id));
            calendar.push(event);
        }

        calendar.to_string().into_bytes()
    }
}
