use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub type SessionId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Scheduled,
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    Beginner,
    Intermediate,
    Advanced,
}

/// A bookable time slot. Only a re-fetch changes `current_participants`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ScheduledSession {
    pub id: SessionId,
    pub class_id: i64,
    pub trainer_id: i64,
    #[serde(deserialize_with = "crate::timestamp::deserialize")]
    #[schema(value_type = String, format = "date-time", example = "2025-11-24T06:00:00Z")]
    pub start_time: DateTime<Utc>,
    #[serde(deserialize_with = "crate::timestamp::deserialize")]
    #[schema(value_type = String, format = "date-time", example = "2025-11-24T07:00:00Z")]
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub override_capacity: Option<u32>,
    #[serde(default)]
    pub current_participants: u32,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ClassDefinition {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Minutes.
    pub duration: u32,
    pub difficulty_level: DifficultyLevel,
    pub max_capacity: u32,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct SessionWithClass {
    pub session: ScheduledSession,
    #[serde(rename = "class")]
    pub class_def: ClassDefinition,
}

impl SessionWithClass {
    pub fn id(&self) -> SessionId {
        self.session.id
    }

    pub fn effective_capacity(&self) -> u32 {
        self.session
            .override_capacity
            .unwrap_or(self.class_def.max_capacity)
    }

    pub fn spots_left(&self) -> u32 {
        self.effective_capacity()
            .saturating_sub(self.session.current_participants)
    }

    pub fn is_full(&self) -> bool {
        self.spots_left() == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationStatus {
    Registered,
    Attended,
    NoShow,
    Cancelled,
    #[serde(other)]
    Other,
}

/// One row of the "my classes" listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct MyClassEntry {
    pub session_id: SessionId,
    pub status: ParticipationStatus,
    #[serde(default)]
    pub session: Option<ScheduledSession>,
}

impl MyClassEntry {
    pub fn is_registered(&self) -> bool {
        self.status == ParticipationStatus::Registered
    }
}

/// Body of non-2xx responses from the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}
