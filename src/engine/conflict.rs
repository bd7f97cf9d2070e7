//! Double-booking detection.
//!
//! Two trips collide only when their scheduled timestamps are exactly equal;
//! overlapping durations are not considered. Callers run this inside the
//! same ledger transaction that performs the write.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::store::Ledger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Driver(Uuid),
    Vehicle(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conflict {
    pub trip_id: Uuid,
    pub resource: Resource,
}

impl Conflict {
    pub fn into_error(self, scheduled_for: DateTime<Utc>) -> AppError {
        let what = match self.resource {
            Resource::Driver(id) => format!("driver {id}"),
            Resource::Vehicle(id) => format!("vehicle {id}"),
        };
        AppError::Conflict(format!(
            "{what} already booked at {} by trip {}",
            scheduled_for.to_rfc3339(),
            self.trip_id
        ))
    }
}

/// Looks for an active assignment holding the driver, or the vehicle when one
/// is given, at exactly `scheduled_for`. Driver clashes are reported first.
pub fn find_conflict(
    ledger: &Ledger,
    driver_id: Uuid,
    vehicle_id: Option<Uuid>,
    scheduled_for: DateTime<Utc>,
    exclude_trip: Option<Uuid>,
) -> Option<Conflict> {
    let mut vehicle_clash = None;

    for assignment in ledger.assignments() {
        if Some(assignment.trip_id) == exclude_trip {
            continue;
        }

        let Ok(trip) = ledger.trip(assignment.trip_id) else {
            continue;
        };
        if trip.scheduled_for != scheduled_for || !trip.state.occupies_slot() {
            continue;
        }

        if assignment.driver_id == driver_id {
            return Some(Conflict {
                trip_id: trip.id,
                resource: Resource::Driver(driver_id),
            });
        }

        if let Some(vehicle_id) = vehicle_id {
            if vehicle_clash.is_none() && assignment.vehicle_id == Some(vehicle_id) {
                vehicle_clash = Some(Conflict {
                    trip_id: trip.id,
                    resource: Resource::Vehicle(vehicle_id),
                });
            }
        }
    }

    vehicle_clash
}

pub fn has_conflict(
    ledger: &Ledger,
    driver_id: Uuid,
    vehicle_id: Option<Uuid>,
    scheduled_for: DateTime<Utc>,
    exclude_trip: Option<Uuid>,
) -> bool {
    find_conflict(ledger, driver_id, vehicle_id, scheduled_for, exclude_trip).is_some()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    use super::{find_conflict, has_conflict, Resource};
    use crate::models::assignment::Assignment;
    use crate::models::trip::{Trip, TripState};
    use crate::store::Ledger;

    fn seed(
        ledger: &mut Ledger,
        state: TripState,
        at: chrono::DateTime<Utc>,
        driver: Uuid,
        vehicle: Uuid,
    ) -> Uuid {
        let trip = Trip {
            id: Uuid::new_v4(),
            hotel_id: Uuid::new_v4(),
            route_id: Uuid::new_v4(),
            requested_by: Uuid::new_v4(),
            requested_at: Utc::now(),
            scheduled_for: at,
            state,
        };
        let trip_id = trip.id;
        let assignment = Assignment::new(trip_id, driver, Some(vehicle), None, Utc::now());
        ledger.open_trip(trip, Some(assignment)).unwrap();
        trip_id
    }

    fn nine_am() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn same_driver_same_time_conflicts() {
        let mut ledger = Ledger::default();
        let driver = Uuid::new_v4();
        let booked = seed(&mut ledger, TripState::Assigned, nine_am(), driver, Uuid::new_v4());

        let conflict = find_conflict(&ledger, driver, None, nine_am(), None).unwrap();
        assert_eq!(conflict.trip_id, booked);
        assert_eq!(conflict.resource, Resource::Driver(driver));
    }

    #[test]
    fn different_time_never_conflicts() {
        let mut ledger = Ledger::default();
        let driver = Uuid::new_v4();
        seed(&mut ledger, TripState::Accepted, nine_am(), driver, Uuid::new_v4());

        let one_minute_later = nine_am() + Duration::minutes(1);
        assert!(!has_conflict(&ledger, driver, None, one_minute_later, None));
    }

    #[test]
    fn vehicle_only_checked_when_given() {
        let mut ledger = Ledger::default();
        let vehicle = Uuid::new_v4();
        seed(&mut ledger, TripState::InProgress, nine_am(), Uuid::new_v4(), vehicle);

        let other_driver = Uuid::new_v4();
        assert!(!has_conflict(&ledger, other_driver, None, nine_am(), None));

        let conflict = find_conflict(&ledger, other_driver, Some(vehicle), nine_am(), None).unwrap();
        assert_eq!(conflict.resource, Resource::Vehicle(vehicle));
    }

    #[test]
    fn completed_trips_do_not_hold_the_slot() {
        let mut ledger = Ledger::default();
        let driver = Uuid::new_v4();
        seed(&mut ledger, TripState::Completed, nine_am(), driver, Uuid::new_v4());

        assert!(!has_conflict(&ledger, driver, None, nine_am(), None));
    }

    #[test]
    fn excluded_trip_is_ignored() {
        let mut ledger = Ledger::default();
        let driver = Uuid::new_v4();
        let vehicle = Uuid::new_v4();
        let own = seed(&mut ledger, TripState::Assigned, nine_am(), driver, vehicle);

        assert!(!has_conflict(&ledger, driver, Some(vehicle), nine_am(), Some(own)));
    }
}
