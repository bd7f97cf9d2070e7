//! Supervisor-driven assign, reassign and unassign.

use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::Claims;
use crate::engine::conflict;
use crate::engine::notify;
use crate::engine::pairing::current_vehicle_of;
use crate::engine::state_machine::{self, TripEvent};
use crate::engine::trips::TripDetail;
use crate::error::AppError;
use crate::models::assignment::Assignment;
use crate::models::fleet::{User, Vehicle, VehicleStatus};
use crate::models::trip::Trip;
use crate::state::AppState;
use crate::store::Ledger;

fn validate_driver(state: &AppState, hotel_id: Uuid, driver_id: Uuid) -> Result<User, AppError> {
    let driver = state.fleet.driver(driver_id)?;
    if driver.hotel_id != Some(hotel_id) {
        return Err(AppError::Validation(format!(
            "driver {driver_id} does not belong to this hotel"
        )));
    }
    if !driver.is_dispatchable_driver() {
        return Err(AppError::Validation(format!(
            "driver {driver_id} is inactive or suspended"
        )));
    }
    Ok(driver)
}

fn validate_vehicle(state: &AppState, hotel_id: Uuid, vehicle_id: Uuid) -> Result<Vehicle, AppError> {
    let vehicle = state.fleet.vehicle(vehicle_id)?;
    if vehicle.hotel_id != hotel_id {
        return Err(AppError::Validation(format!(
            "vehicle {vehicle_id} does not belong to this hotel"
        )));
    }
    if vehicle.status != VehicleStatus::Available {
        return Err(AppError::Validation(format!(
            "vehicle {vehicle_id} is not available ({:?})",
            vehicle.status
        )));
    }
    Ok(vehicle)
}

fn hotel_trip(ledger: &Ledger, hotel_id: Uuid, trip_id: Uuid) -> Result<Trip, AppError> {
    let trip = ledger.trip(trip_id)?;
    if trip.hotel_id != hotel_id {
        return Err(AppError::Forbidden(format!(
            "trip {trip_id} belongs to another hotel"
        )));
    }
    Ok(trip.clone())
}

fn ensure_free(
    ledger: &Ledger,
    trip: &Trip,
    driver_id: Uuid,
    vehicle_id: Uuid,
) -> Result<(), AppError> {
    match conflict::find_conflict(
        ledger,
        driver_id,
        Some(vehicle_id),
        trip.scheduled_for,
        Some(trip.id),
    ) {
        Some(clash) => Err(clash.into_error(trip.scheduled_for)),
        None => Ok(()),
    }
}

fn record_outcome<T>(state: &AppState, operation: &str, started: Instant, result: &Result<T, AppError>) {
    let outcome = match result {
        Ok(_) => "assigned",
        Err(err) => err.reason(),
    };
    state.metrics.record_assignment("manual", outcome);
    state
        .metrics
        .observe_latency(operation, started.elapsed().as_secs_f64());

    if let Err(err) = result {
        warn!(operation, reason = err.reason(), error = %err, "manual assignment refused");
    }
}

/// Assigns a pending trip to a driver using the vehicle the driver is paired with.
pub fn assign_trip(
    state: &AppState,
    caller: &Claims,
    trip_id: Uuid,
    driver_id: Uuid,
) -> Result<TripDetail, AppError> {
    let started = Instant::now();
    let hotel_id = caller.require_supervisor()?;

    let result = state.store.transaction(|ledger| {
        let trip = hotel_trip(ledger, hotel_id, trip_id)?;
        let next = state_machine::ensure(trip.state, TripEvent::Assign)?;

        let vehicle_id =
            current_vehicle_of(ledger, driver_id).ok_or(AppError::NoVehiclePaired(driver_id))?;
        validate_driver(state, hotel_id, driver_id)?;
        validate_vehicle(state, hotel_id, vehicle_id)?;
        ensure_free(ledger, &trip, driver_id, vehicle_id)?;

        let assignment = Assignment::new(
            trip_id,
            driver_id,
            Some(vehicle_id),
            Some(caller.subject_id),
            Utc::now(),
        );
        let trip = ledger.commit_assignment(assignment.clone(), next)?;

        Ok(TripDetail {
            trip,
            assignment: Some(assignment),
        })
    });
    record_outcome(state, "assign_trip", started, &result);
    let detail = result?;

    state.metrics.record_transition(TripEvent::Assign.as_str());
    notify::emit(state, notify::trip_assigned(state, &detail.trip, driver_id));

    info!(
        trip_id = %trip_id,
        driver_id = %driver_id,
        assigned_by = %caller.subject_id,
        "trip assigned manually"
    );

    Ok(detail)
}

/// Moves an assigned or accepted trip to another driver. Without an explicit
/// vehicle the driver's paired vehicle is used.
pub fn reassign_trip(
    state: &AppState,
    caller: &Claims,
    trip_id: Uuid,
    driver_id: Uuid,
    vehicle_id: Option<Uuid>,
) -> Result<TripDetail, AppError> {
    let started = Instant::now();
    let hotel_id = caller.require_supervisor()?;

    let result = state.store.transaction(|ledger| {
        let trip = hotel_trip(ledger, hotel_id, trip_id)?;
        let next = state_machine::ensure(trip.state, TripEvent::Reassign)?;

        let vehicle_id = match vehicle_id {
            Some(vehicle_id) => vehicle_id,
            None => current_vehicle_of(ledger, driver_id)
                .ok_or(AppError::NoVehiclePaired(driver_id))?,
        };
        validate_driver(state, hotel_id, driver_id)?;
        validate_vehicle(state, hotel_id, vehicle_id)?;
        ensure_free(ledger, &trip, driver_id, vehicle_id)?;

        let previous_driver = ledger
            .assignment_for(trip_id)
            .map(|assignment| assignment.driver_id);

        let now = Utc::now();
        let (trip, assignment) = ledger.advance(trip_id, next, |assignment| {
            assignment.driver_id = driver_id;
            assignment.vehicle_id = Some(vehicle_id);
            assignment.assigned_by = Some(caller.subject_id);
            assignment.assigned_at = now;
            assignment.accepted_at = None;
        })?;

        Ok((
            TripDetail {
                trip,
                assignment: Some(assignment),
            },
            previous_driver,
        ))
    });
    record_outcome(state, "reassign_trip", started, &result);
    let (detail, previous_driver) = result?;

    state.metrics.record_transition(TripEvent::Reassign.as_str());
    notify::emit(state, notify::trip_assigned(state, &detail.trip, driver_id));

    info!(
        trip_id = %trip_id,
        driver_id = %driver_id,
        previous_driver = ?previous_driver,
        assigned_by = %caller.subject_id,
        "trip reassigned"
    );

    Ok(detail)
}

pub fn unassign_trip(state: &AppState, caller: &Claims, trip_id: Uuid) -> Result<Trip, AppError> {
    let hotel_id = caller.require_supervisor()?;

    let (trip, released) = state.store.transaction(|ledger| {
        let trip = hotel_trip(ledger, hotel_id, trip_id)?;
        let next = state_machine::ensure(trip.state, TripEvent::Unassign)?;
        ledger.release_assignment(trip_id, next)
    })?;

    state.metrics.record_transition(TripEvent::Unassign.as_str());
    info!(
        trip_id = %trip_id,
        released_driver = ?released.map(|assignment| assignment.driver_id),
        unassigned_by = %caller.subject_id,
        "trip unassigned"
    );

    Ok(trip)
}
