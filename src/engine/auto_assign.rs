//! First-fit driver selection for newly created trips.
//!
//! Candidates are the hotel's dispatchable drivers holding an open pairing,
//! visited in ascending driver id order. The first one whose driver and paired
//! vehicle are both free at the trip's scheduled time wins. A re-paired
//! vehicle keeps the bookings it took under its previous pairing.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::engine::conflict;
use crate::engine::pairing::current_vehicle_of;
use crate::engine::state_machine::{self, TripEvent};
use crate::error::AppError;
use crate::fleet::Fleet;
use crate::models::assignment::{Assignment, AssignmentOutcome, UnassignedReason};
use crate::models::trip::Trip;
use crate::store::Ledger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct AutoAssignPlan {
    pub outcome: AssignmentOutcome,
    pub assignment: Option<Assignment>,
}

impl AutoAssignPlan {
    fn unassigned(reason: UnassignedReason) -> Self {
        Self {
            outcome: AssignmentOutcome::Unassigned { reason },
            assignment: None,
        }
    }
}

pub fn eligible_candidates(fleet: &Fleet, ledger: &Ledger, hotel_id: Uuid) -> Vec<Candidate> {
    fleet
        .drivers_of(hotel_id)
        .into_iter()
        .filter(|driver| driver.is_dispatchable_driver() && fleet.weekly_available(driver.id))
        .filter_map(|driver| {
            current_vehicle_of(ledger, driver.id).map(|vehicle_id| Candidate {
                driver_id: driver.id,
                vehicle_id,
            })
        })
        .collect()
}

pub fn select_candidate(
    ledger: &Ledger,
    candidates: &[Candidate],
    trip: &Trip,
) -> Option<Candidate> {
    candidates.iter().copied().find(|candidate| {
        !conflict::has_conflict(
            ledger,
            candidate.driver_id,
            Some(candidate.vehicle_id),
            trip.scheduled_for,
            Some(trip.id),
        )
    })
}

/// Works out what auto-dispatch would do for `trip` without writing anything.
/// The caller commits the returned assignment in the same transaction.
pub fn plan(
    fleet: &Fleet,
    ledger: &Ledger,
    trip: &Trip,
    now: DateTime<Utc>,
) -> Result<AutoAssignPlan, AppError> {
    state_machine::ensure(trip.state, TripEvent::Assign)?;

    let candidates = eligible_candidates(fleet, ledger, trip.hotel_id);
    if candidates.is_empty() {
        return Ok(AutoAssignPlan::unassigned(UnassignedReason::NoEligibleDriver));
    }

    let Some(chosen) = select_candidate(ledger, &candidates, trip) else {
        return Ok(AutoAssignPlan::unassigned(UnassignedReason::AllDriversBooked));
    };

    Ok(AutoAssignPlan {
        outcome: AssignmentOutcome::Assigned {
            driver_id: chosen.driver_id,
            vehicle_id: chosen.vehicle_id,
        },
        assignment: Some(Assignment::new(
            trip.id,
            chosen.driver_id,
            Some(chosen.vehicle_id),
            None,
            now,
        )),
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{eligible_candidates, plan};
    use crate::engine::pairing::{pair, unpair};
    use crate::engine::testing::Fixture;
    use crate::models::assignment::{AssignmentOutcome, UnassignedReason};
    use crate::models::trip::TripState;

    #[test]
    fn no_paired_driver_leaves_trip_unassigned() {
        let fx = Fixture::new();
        fx.driver("Dana");
        let trip = fx.pending_trip(fx.nine_am());

        let plan = fx
            .state
            .store
            .read(|ledger| plan(&fx.state.fleet, ledger, &trip, Utc::now()))
            .unwrap()
            .unwrap();

        assert_eq!(
            plan.outcome,
            AssignmentOutcome::Unassigned {
                reason: UnassignedReason::NoEligibleDriver
            }
        );
        assert!(plan.assignment.is_none());
    }

    #[test]
    fn lowest_driver_id_wins() {
        let fx = Fixture::new();
        let mut drivers: Vec<_> = ["A", "B", "C"]
            .iter()
            .enumerate()
            .map(|(i, name)| fx.paired_driver(name, &format!("CC-00{i}")))
            .collect();
        drivers.sort_by_key(|(driver, _)| *driver);

        let trip = fx.pending_trip(fx.nine_am());
        let plan = fx
            .state
            .store
            .read(|ledger| plan(&fx.state.fleet, ledger, &trip, Utc::now()))
            .unwrap()
            .unwrap();

        let (driver_id, vehicle_id) = drivers[0];
        assert_eq!(
            plan.outcome,
            AssignmentOutcome::Assigned {
                driver_id,
                vehicle_id
            }
        );
        let assignment = plan.assignment.unwrap();
        assert!(assignment.assigned_by.is_none());
        assert_eq!(assignment.vehicle_id, Some(vehicle_id));
    }

    #[test]
    fn booked_driver_is_skipped_for_next_candidate() {
        let fx = Fixture::new();
        let mut drivers = vec![
            fx.paired_driver("A", "DD-001"),
            fx.paired_driver("B", "DD-002"),
        ];
        drivers.sort_by_key(|(driver, _)| *driver);

        let first = fx.create_trip(fx.nine_am());
        assert_eq!(first.trip.state, TripState::Assigned);
        assert_eq!(first.assignment.as_ref().unwrap().driver_id, drivers[0].0);

        let second = fx.create_trip(fx.nine_am());
        assert_eq!(second.trip.state, TripState::Assigned);
        assert_eq!(second.assignment.as_ref().unwrap().driver_id, drivers[1].0);

        let third = fx.create_trip(fx.nine_am());
        assert_eq!(third.trip.state, TripState::Pending);
        assert_eq!(
            third.outcome,
            AssignmentOutcome::Unassigned {
                reason: UnassignedReason::AllDriversBooked
            }
        );
    }

    #[test]
    fn repaired_vehicle_keeps_its_earlier_booking() {
        let fx = Fixture::new();
        let (first_driver, vehicle) = fx.paired_driver("A", "GG-001");
        let booked = fx.create_trip(fx.nine_am());
        assert_eq!(booked.assignment.as_ref().unwrap().driver_id, first_driver);

        let open = fx
            .state
            .store
            .read(|ledger| ledger.open_pairing_of_driver(first_driver).unwrap().id)
            .unwrap();
        unpair(&fx.state, &fx.supervisor, open).unwrap();
        let second_driver = fx.driver("B");
        pair(&fx.state, &fx.supervisor, second_driver, vehicle).unwrap();

        let second = fx.create_trip(fx.nine_am());
        assert_eq!(second.trip.state, TripState::Pending);
        assert_eq!(
            second.outcome,
            AssignmentOutcome::Unassigned {
                reason: UnassignedReason::AllDriversBooked
            }
        );

        let vehicle_bookings = fx
            .state
            .store
            .read(|ledger| {
                ledger
                    .assignments()
                    .filter(|assignment| assignment.vehicle_id == Some(vehicle))
                    .filter(|assignment| {
                        ledger
                            .trip(assignment.trip_id)
                            .is_ok_and(|trip| trip.scheduled_for == fx.nine_am())
                    })
                    .count()
            })
            .unwrap();
        assert_eq!(vehicle_bookings, 1);

        let later = fx.create_trip(fx.nine_am() + chrono::Duration::hours(1));
        assert_eq!(later.assignment.unwrap().driver_id, second_driver);
    }

    #[test]
    fn suspended_and_weekly_unavailable_drivers_are_not_candidates() {
        let fx = Fixture::new();
        let (suspended, _) = fx.paired_driver("A", "EE-001");
        let (resting, _) = fx.paired_driver("B", "EE-002");
        let (ready, _) = fx.paired_driver("C", "EE-003");

        fx.state
            .fleet
            .update_user_status(suspended, None, Some(true))
            .unwrap();
        fx.state.fleet.set_weekly_availability(resting, false).unwrap();

        let candidates = fx
            .state
            .store
            .read(|ledger| eligible_candidates(&fx.state.fleet, ledger, fx.hotel))
            .unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].driver_id, ready);
    }

    #[test]
    fn selection_is_deterministic() {
        let fx = Fixture::new();
        for (name, plate) in [("A", "FF-001"), ("B", "FF-002"), ("C", "FF-003")] {
            fx.paired_driver(name, plate);
        }

        let trip = fx.pending_trip(fx.nine_am());
        let picks: Vec<_> = (0..5)
            .map(|_| {
                fx.state
                    .store
                    .read(|ledger| plan(&fx.state.fleet, ledger, &trip, Utc::now()))
                    .unwrap()
                    .unwrap()
                    .outcome
            })
            .collect();

        assert!(picks.windows(2).all(|pair| pair[0] == pair[1]));
    }
}
