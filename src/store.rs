//! The dispatch ledger: trips, assignments and driver–vehicle pairings.
//!
//! Every dispatch operation runs inside [`DispatchStore::transaction`], which
//! holds the ledger lock for the whole read-validate-write sequence. Closures
//! must finish validating before their first write. Each write primitive on
//! [`Ledger`] checks its own preconditions before touching any map, so a
//! closure that returns `Err` leaves the ledger as it found it.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::assignment::Assignment;
use crate::models::pairing::Pairing;
use crate::models::trip::{Trip, TripState};

#[derive(Debug, Default)]
pub struct Ledger {
    trips: HashMap<Uuid, Trip>,
    /// Keyed by trip id: one assignment per trip.
    assignments: HashMap<Uuid, Assignment>,
    pairings: HashMap<Uuid, Pairing>,
    open_by_driver: HashMap<Uuid, Uuid>,
    open_by_vehicle: HashMap<Uuid, Uuid>,
}

impl Ledger {
    pub fn trip(&self, trip_id: Uuid) -> Result<&Trip, AppError> {
        self.trips
            .get(&trip_id)
            .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))
    }

    pub fn trip_mut(&mut self, trip_id: Uuid) -> Result<&mut Trip, AppError> {
        self.trips
            .get_mut(&trip_id)
            .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))
    }

    pub fn trips(&self) -> impl Iterator<Item = &Trip> {
        self.trips.values()
    }

    pub fn assignment_for(&self, trip_id: Uuid) -> Option<&Assignment> {
        self.assignments.get(&trip_id)
    }

    pub fn assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.assignments.values()
    }

    /// Inserts a new trip together with the assignment auto-dispatch picked
    /// for it, if any.
    pub fn open_trip(&mut self, trip: Trip, assignment: Option<Assignment>) -> Result<(), AppError> {
        if self.trips.contains_key(&trip.id) {
            return Err(AppError::Conflict(format!("trip {} already exists", trip.id)));
        }
        if let Some(assignment) = &assignment {
            if assignment.trip_id != trip.id {
                return Err(AppError::Internal(format!(
                    "assignment {} does not belong to trip {}",
                    assignment.id, trip.id
                )));
            }
        }

        if let Some(assignment) = assignment {
            self.assignments.insert(trip.id, assignment);
        }
        self.trips.insert(trip.id, trip);
        Ok(())
    }

    /// Binds an assignment to an existing trip and moves the trip to `state`.
    /// Fails with `Conflict` if the trip already has an assignment.
    pub fn commit_assignment(
        &mut self,
        assignment: Assignment,
        state: TripState,
    ) -> Result<Trip, AppError> {
        let trip_id = assignment.trip_id;
        self.trip(trip_id)?;
        if self.assignments.contains_key(&trip_id) {
            return Err(AppError::Conflict(format!(
                "trip {trip_id} already has an assignment"
            )));
        }

        self.assignments.insert(trip_id, assignment);
        let trip = self.trip_mut(trip_id)?;
        trip.state = state;
        Ok(trip.clone())
    }

    /// Updates the trip's assignment and state together.
    pub fn advance<F>(
        &mut self,
        trip_id: Uuid,
        state: TripState,
        stamp: F,
    ) -> Result<(Trip, Assignment), AppError>
    where
        F: FnOnce(&mut Assignment),
    {
        self.trip(trip_id)?;
        let mut assignment = self
            .assignments
            .get(&trip_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} has no assignment")))?;

        stamp(&mut assignment);
        if !assignment.consistent_with(state) {
            return Err(AppError::Internal(format!(
                "assignment of trip {trip_id} does not match state {state:?}"
            )));
        }

        self.assignments.insert(trip_id, assignment.clone());
        let trip = self.trip_mut(trip_id)?;
        trip.state = state;
        Ok((trip.clone(), assignment))
    }

    /// Deletes the trip's assignment, if any, and moves the trip to `state`.
    pub fn release_assignment(
        &mut self,
        trip_id: Uuid,
        state: TripState,
    ) -> Result<(Trip, Option<Assignment>), AppError> {
        self.trip(trip_id)?;

        let removed = self.assignments.remove(&trip_id);
        let trip = self.trip_mut(trip_id)?;
        trip.state = state;
        Ok((trip.clone(), removed))
    }

    pub fn pairing(&self, pairing_id: Uuid) -> Result<&Pairing, AppError> {
        self.pairings
            .get(&pairing_id)
            .ok_or_else(|| AppError::NotFound(format!("pairing {pairing_id} not found")))
    }

    pub fn open_pairing_of_driver(&self, driver_id: Uuid) -> Option<&Pairing> {
        self.open_by_driver
            .get(&driver_id)
            .and_then(|id| self.pairings.get(id))
    }

    pub fn open_pairing_of_vehicle(&self, vehicle_id: Uuid) -> Option<&Pairing> {
        self.open_by_vehicle
            .get(&vehicle_id)
            .and_then(|id| self.pairings.get(id))
    }

    pub fn open_pairings(&self) -> impl Iterator<Item = &Pairing> {
        self.open_by_driver
            .values()
            .filter_map(|id| self.pairings.get(id))
    }

    /// Closes the driver's open pairing, if any, and opens a new one.
    pub fn open_pairing(
        &mut self,
        driver_id: Uuid,
        vehicle_id: Uuid,
        now: DateTime<Utc>,
    ) -> (Pairing, Option<Pairing>) {
        let closed = self
            .open_by_driver
            .get(&driver_id)
            .copied()
            .and_then(|previous| self.close_pairing(previous, now));

        let pairing = Pairing {
            id: Uuid::new_v4(),
            driver_id,
            vehicle_id,
            started_at: now,
            ended_at: None,
        };

        self.open_by_driver.insert(driver_id, pairing.id);
        self.open_by_vehicle.insert(vehicle_id, pairing.id);
        self.pairings.insert(pairing.id, pairing.clone());

        (pairing, closed)
    }

    /// Sets the end timestamp and drops the pairing from the open indexes.
    /// Returns `None` if the pairing is unknown or already closed.
    pub fn close_pairing(&mut self, pairing_id: Uuid, now: DateTime<Utc>) -> Option<Pairing> {
        let pairing = self.pairings.get_mut(&pairing_id)?;
        if !pairing.is_open() {
            return None;
        }

        pairing.ended_at = Some(now);
        if self.open_by_driver.get(&pairing.driver_id) == Some(&pairing_id) {
            self.open_by_driver.remove(&pairing.driver_id);
        }
        if self.open_by_vehicle.get(&pairing.vehicle_id) == Some(&pairing_id) {
            self.open_by_vehicle.remove(&pairing.vehicle_id);
        }

        Some(pairing.clone())
    }

    pub fn trip_count(&self) -> usize {
        self.trips.len()
    }

    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }

    pub fn open_pairing_count(&self) -> usize {
        self.open_by_driver.len()
    }
}

#[derive(Debug, Default)]
pub struct DispatchStore {
    ledger: Mutex<Ledger>,
}

impl DispatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transaction<T, F>(&self, work: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Ledger) -> Result<T, AppError>,
    {
        let mut ledger = self
            .ledger
            .lock()
            .map_err(|_| AppError::Internal("dispatch ledger lock poisoned".to_string()))?;

        work(&mut ledger)
    }

    pub fn read<T, F>(&self, work: F) -> Result<T, AppError>
    where
        F: FnOnce(&Ledger) -> T,
    {
        let ledger = self
            .ledger
            .lock()
            .map_err(|_| AppError::Internal("dispatch ledger lock poisoned".to_string()))?;

        Ok(work(&ledger))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::Ledger;
    use crate::models::assignment::Assignment;
    use crate::models::trip::{Trip, TripState};

    fn pending_trip() -> Trip {
        Trip {
            id: Uuid::new_v4(),
            hotel_id: Uuid::new_v4(),
            route_id: Uuid::new_v4(),
            requested_by: Uuid::new_v4(),
            requested_at: Utc::now(),
            scheduled_for: Utc::now(),
            state: TripState::Pending,
        }
    }

    #[test]
    fn second_assignment_for_same_trip_is_rejected() {
        let mut ledger = Ledger::default();
        let trip = pending_trip();
        let trip_id = trip.id;
        let now = Utc::now();
        ledger.open_trip(trip, None).unwrap();

        ledger
            .commit_assignment(
                Assignment::new(trip_id, Uuid::new_v4(), None, None, now),
                TripState::Assigned,
            )
            .unwrap();
        let err = ledger
            .commit_assignment(
                Assignment::new(trip_id, Uuid::new_v4(), None, None, now),
                TripState::Assigned,
            )
            .unwrap_err();

        assert_eq!(err.reason(), "conflict");
        assert_eq!(ledger.assignment_count(), 1);
        assert_eq!(ledger.trip(trip_id).unwrap().state, TripState::Assigned);
    }

    #[test]
    fn assignment_for_unknown_trip_writes_nothing() {
        let mut ledger = Ledger::default();
        let err = ledger
            .commit_assignment(
                Assignment::new(Uuid::new_v4(), Uuid::new_v4(), None, None, Utc::now()),
                TripState::Assigned,
            )
            .unwrap_err();

        assert_eq!(err.reason(), "not_found");
        assert_eq!(ledger.assignment_count(), 0);
    }

    #[test]
    fn release_removes_assignment_and_sets_state() {
        let mut ledger = Ledger::default();
        let trip = pending_trip();
        let trip_id = trip.id;
        let assignment = Assignment::new(trip_id, Uuid::new_v4(), None, None, Utc::now());
        let mut assigned = trip;
        assigned.state = TripState::Assigned;
        ledger.open_trip(assigned, Some(assignment)).unwrap();

        let (trip, removed) = ledger
            .release_assignment(trip_id, TripState::Pending)
            .unwrap();
        assert_eq!(trip.state, TripState::Pending);
        assert!(removed.is_some());
        assert!(ledger.assignment_for(trip_id).is_none());
    }

    #[test]
    fn advance_rejects_stamps_that_disagree_with_state() {
        let mut ledger = Ledger::default();
        let mut trip = pending_trip();
        trip.state = TripState::Assigned;
        let trip_id = trip.id;
        let assignment = Assignment::new(trip_id, Uuid::new_v4(), None, None, Utc::now());
        ledger.open_trip(trip, Some(assignment)).unwrap();

        let err = ledger
            .advance(trip_id, TripState::InProgress, |a| a.started_at = Some(Utc::now()))
            .unwrap_err();
        assert_eq!(err.reason(), "internal");
        assert_eq!(ledger.trip(trip_id).unwrap().state, TripState::Assigned);
        assert!(ledger.assignment_for(trip_id).unwrap().started_at.is_none());

        let (trip, assignment) = ledger
            .advance(trip_id, TripState::Accepted, |a| a.accepted_at = Some(Utc::now()))
            .unwrap();
        assert_eq!(trip.state, TripState::Accepted);
        assert!(assignment.accepted_at.is_some());
    }

    #[test]
    fn reopening_closes_previous_pairing_and_updates_indexes() {
        let mut ledger = Ledger::default();
        let driver = Uuid::new_v4();
        let first_vehicle = Uuid::new_v4();
        let second_vehicle = Uuid::new_v4();

        let (first, closed) = ledger.open_pairing(driver, first_vehicle, Utc::now());
        assert!(closed.is_none());

        let (second, closed) = ledger.open_pairing(driver, second_vehicle, Utc::now());
        let closed = closed.unwrap();
        assert_eq!(closed.id, first.id);
        assert!(closed.ended_at.is_some());

        assert_eq!(ledger.open_pairing_of_driver(driver).unwrap().id, second.id);
        assert!(ledger.open_pairing_of_vehicle(first_vehicle).is_none());
        assert_eq!(
            ledger.open_pairing_of_vehicle(second_vehicle).unwrap().id,
            second.id
        );
        assert_eq!(ledger.open_pairing_count(), 1);
    }

    #[test]
    fn closing_twice_returns_none() {
        let mut ledger = Ledger::default();
        let (pairing, _) = ledger.open_pairing(Uuid::new_v4(), Uuid::new_v4(), Utc::now());

        assert!(ledger.close_pairing(pairing.id, Utc::now()).is_some());
        assert!(ledger.close_pairing(pairing.id, Utc::now()).is_none());
        assert_eq!(ledger.open_pairing_count(), 0);
    }
}
