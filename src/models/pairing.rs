use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A vehicle handed to a driver, independent of any trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pairing {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Pairing {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}
