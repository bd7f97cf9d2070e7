use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Requester,
    Driver,
    Supervisor,
    Admin,
}

impl Role {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Role::Requester),
            2 => Some(Role::Driver),
            3 => Some(Role::Supervisor),
            4 => Some(Role::Admin),
            _ => None,
        }
    }

    /// Accepts either the role name (any case) or its numeric code.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(code) = raw.parse::<u8>() {
            return Self::from_code(code);
        }

        match raw.to_ascii_lowercase().as_str() {
            "requester" | "user" => Some(Role::Requester),
            "driver" => Some(Role::Driver),
            "supervisor" => Some(Role::Supervisor),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn is_supervisory(self) -> bool {
        matches!(self, Role::Supervisor | Role::Admin)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityState {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleStatus {
    Available,
    Maintenance,
    OutOfService,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotel {
    pub id: Uuid,
    pub name: String,
    pub activity: ActivityState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub name: String,
    pub origin: String,
    pub destination: String,
    pub activity: ActivityState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub hotel_id: Option<Uuid>,
    pub role: Role,
    pub name: String,
    pub activity: ActivityState,
    pub suspended: bool,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Driver who may take trips right now, ignoring pairing and bookings.
    pub fn is_dispatchable_driver(&self) -> bool {
        self.role == Role::Driver && self.activity == ActivityState::Active && !self.suspended
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub plate: String,
    pub status: VehicleStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverAvailability {
    pub driver_id: Uuid,
    pub weekly_available: bool,
    pub shift_started_at: Option<DateTime<Utc>>,
    pub shift_ended_at: Option<DateTime<Utc>>,
}

impl DriverAvailability {
    pub fn new(driver_id: Uuid) -> Self {
        Self {
            driver_id,
            weekly_available: true,
            shift_started_at: None,
            shift_ended_at: None,
        }
    }

    /// Starting a shift clears the previous end marker.
    pub fn on_shift(&self) -> bool {
        self.shift_started_at.is_some() && self.shift_ended_at.is_none()
    }
}
