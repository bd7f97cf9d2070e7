use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::auth::Claims;
use crate::engine::notify::NotificationIntent;
use crate::engine::pairing::pair;
use crate::engine::trips::{create_trip, NewTrip, TripCreated};
use crate::models::fleet::Role;
use crate::models::trip::{Trip, TripState};
use crate::state::AppState;

/// One hotel with a supervisor, a requester and a route.
pub struct Fixture {
    pub state: AppState,
    pub hotel: Uuid,
    pub route: Uuid,
    pub supervisor: Claims,
    pub requester: Claims,
    _notification_rx: mpsc::Receiver<NotificationIntent>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_auto_assign(true)
    }

    pub fn with_auto_assign(auto_assign: bool) -> Self {
        let (state, notification_rx) = AppState::new(1024, 64, auto_assign);
        let hotel = state.fleet.register_hotel("Harbour").unwrap();
        let route = state
            .fleet
            .register_route(hotel.id, "Airport", "Lobby", "Terminal 2")
            .unwrap();
        let supervisor = state
            .fleet
            .register_user(Some(hotel.id), Role::Supervisor, "Sam")
            .unwrap();
        let requester = state
            .fleet
            .register_user(Some(hotel.id), Role::Requester, "Riley")
            .unwrap();

        Self {
            supervisor: Claims {
                subject_id: supervisor.id,
                role: Role::Supervisor,
                hotel_id: Some(hotel.id),
            },
            requester: Claims {
                subject_id: requester.id,
                role: Role::Requester,
                hotel_id: Some(hotel.id),
            },
            hotel: hotel.id,
            route: route.id,
            state,
            _notification_rx: notification_rx,
        }
    }

    pub fn driver(&self, name: &str) -> Uuid {
        self.state
            .fleet
            .register_user(Some(self.hotel), Role::Driver, name)
            .unwrap()
            .id
    }

    pub fn vehicle(&self, plate: &str) -> Uuid {
        self.state
            .fleet
            .register_vehicle(self.hotel, plate)
            .unwrap()
            .id
    }

    pub fn paired_driver(&self, name: &str, plate: &str) -> (Uuid, Uuid) {
        let driver = self.driver(name);
        let vehicle = self.vehicle(plate);
        pair(&self.state, &self.supervisor, driver, vehicle).unwrap();
        (driver, vehicle)
    }

    pub fn claims_for(&self, user_id: Uuid) -> Claims {
        let user = self.state.fleet.user(user_id).unwrap();
        Claims {
            subject_id: user.id,
            role: user.role,
            hotel_id: user.hotel_id,
        }
    }

    /// Supervisor of a second hotel.
    pub fn outside_supervisor(&self) -> Claims {
        let hotel = self.state.fleet.register_hotel("Summit").unwrap();
        let user = self
            .state
            .fleet
            .register_user(Some(hotel.id), Role::Supervisor, "Olive")
            .unwrap();
        self.claims_for(user.id)
    }

    pub fn nine_am(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
    }

    /// A pending trip that has not been written to the ledger.
    pub fn pending_trip(&self, scheduled_for: DateTime<Utc>) -> Trip {
        Trip {
            id: Uuid::new_v4(),
            hotel_id: self.hotel,
            route_id: self.route,
            requested_by: self.requester.subject_id,
            requested_at: Utc::now(),
            scheduled_for,
            state: TripState::Pending,
        }
    }

    pub fn create_trip(&self, scheduled_for: DateTime<Utc>) -> TripCreated {
        create_trip(
            &self.state,
            &self.requester,
            NewTrip {
                route_id: self.route,
                scheduled_for,
                requested_by: None,
            },
        )
        .unwrap()
    }
}
