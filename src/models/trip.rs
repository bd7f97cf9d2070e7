use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripState {
    Pending,
    Assigned,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl TripState {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(TripState::Pending),
            2 => Some(TripState::Assigned),
            3 => Some(TripState::Accepted),
            4 => Some(TripState::InProgress),
            5 => Some(TripState::Completed),
            6 => Some(TripState::Cancelled),
            _ => None,
        }
    }

    /// Accepts the state name (any case) or its numeric code.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(code) = raw.parse::<u8>() {
            return Self::from_code(code);
        }

        match raw.to_ascii_uppercase().as_str() {
            "PENDING" => Some(TripState::Pending),
            "ASSIGNED" => Some(TripState::Assigned),
            "ACCEPTED" => Some(TripState::Accepted),
            "IN_PROGRESS" => Some(TripState::InProgress),
            "COMPLETED" => Some(TripState::Completed),
            "CANCELLED" => Some(TripState::Cancelled),
            _ => None,
        }
    }

    /// States that hold the driver and vehicle for the scheduled slot.
    pub fn occupies_slot(self) -> bool {
        matches!(
            self,
            TripState::Assigned | TripState::Accepted | TripState::InProgress
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub route_id: Uuid,
    pub requested_by: Uuid,
    pub requested_at: DateTime<Utc>,
    pub scheduled_for: DateTime<Utc>,
    pub state: TripState,
}
