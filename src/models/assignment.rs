use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::trip::TripState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub driver_id: Uuid,
    pub vehicle_id: Option<Uuid>,
    /// `None` when the system assigned the trip.
    pub assigned_by: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Assignment {
    pub fn new(
        trip_id: Uuid,
        driver_id: Uuid,
        vehicle_id: Option<Uuid>,
        assigned_by: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            trip_id,
            driver_id,
            vehicle_id,
            assigned_by,
            assigned_at: now,
            accepted_at: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Whether the lifecycle timestamps agree with the trip's state.
    pub fn consistent_with(&self, state: TripState) -> bool {
        match state {
            TripState::Pending | TripState::Cancelled => false,
            TripState::Assigned => {
                self.accepted_at.is_none()
                    && self.started_at.is_none()
                    && self.completed_at.is_none()
            }
            TripState::Accepted => {
                self.accepted_at.is_some()
                    && self.started_at.is_none()
                    && self.completed_at.is_none()
            }
            TripState::InProgress => {
                self.accepted_at.is_some()
                    && self.started_at.is_some()
                    && self.completed_at.is_none()
            }
            TripState::Completed => {
                self.accepted_at.is_some()
                    && self.started_at.is_some()
                    && self.completed_at.is_some()
            }
        }
    }
}

/// Result of trying to auto-assign a freshly created trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentOutcome {
    Assigned { driver_id: Uuid, vehicle_id: Uuid },
    Unassigned { reason: UnassignedReason },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnassignedReason {
    /// No driver of the hotel is eligible (active, unsuspended, paired).
    NoEligibleDriver,
    /// Every eligible driver already holds a trip at the scheduled time.
    AllDriversBooked,
    Disabled,
}
