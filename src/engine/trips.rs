use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::Claims;
use crate::engine::auto_assign;
use crate::engine::notify;
use crate::engine::state_machine::{self, TripEvent};
use crate::error::AppError;
use crate::models::assignment::{Assignment, AssignmentOutcome, UnassignedReason};
use crate::models::fleet::{ActivityState, Role};
use crate::models::trip::{Trip, TripState};
use crate::state::AppState;
use crate::store::Ledger;

#[derive(Debug, Clone, Deserialize)]
pub struct NewTrip {
    pub route_id: Uuid,
    pub scheduled_for: DateTime<Utc>,
    /// Supervisors may book on behalf of a user of their hotel.
    #[serde(default)]
    pub requested_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TripCreated {
    pub trip: Trip,
    pub assignment: Option<Assignment>,
    #[serde(flatten)]
    pub outcome: AssignmentOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct TripDetail {
    pub trip: Trip,
    pub assignment: Option<Assignment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripFilter {
    /// State name or numeric lifecycle code.
    #[serde(default, deserialize_with = "state_param")]
    pub state: Option<TripState>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

fn state_param<'de, D>(deserializer: D) -> Result<Option<TripState>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    TripState::parse(&raw)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("unknown trip state `{raw}`")))
}

impl TripFilter {
    fn matches(&self, trip: &Trip) -> bool {
        self.state.is_none_or(|state| trip.state == state)
            && self.from.is_none_or(|from| trip.scheduled_for >= from)
            && self.to.is_none_or(|to| trip.scheduled_for <= to)
    }
}

pub fn create_trip(
    state: &AppState,
    caller: &Claims,
    request: NewTrip,
) -> Result<TripCreated, AppError> {
    let started = Instant::now();
    let hotel_id = caller.hotel()?;

    let requested_by = match request.requested_by {
        Some(user_id) if user_id != caller.subject_id => {
            caller.require_supervisor().map_err(|_| {
                AppError::Forbidden("only supervisors may book on behalf of others".to_string())
            })?;
            user_id
        }
        _ => caller.subject_id,
    };
    let requester = state.fleet.user(requested_by)?;
    if requester.hotel_id != Some(hotel_id) {
        return Err(AppError::Validation(format!(
            "user {requested_by} does not belong to this hotel"
        )));
    }

    let route = state.fleet.route(request.route_id)?;
    if route.hotel_id != hotel_id {
        return Err(AppError::NotFound(format!(
            "route {} not found",
            request.route_id
        )));
    }
    if route.activity != ActivityState::Active {
        return Err(AppError::Validation(format!("route {} is inactive", route.id)));
    }

    let now = Utc::now();
    let mut trip = Trip {
        id: Uuid::new_v4(),
        hotel_id,
        route_id: route.id,
        requested_by,
        requested_at: now,
        scheduled_for: request.scheduled_for,
        state: TripState::Pending,
    };

    let created = state.store.transaction(|ledger| {
        let (outcome, assignment) = if state.auto_assign {
            let plan = auto_assign::plan(&state.fleet, ledger, &trip, now)?;
            (plan.outcome, plan.assignment)
        } else {
            (
                AssignmentOutcome::Unassigned {
                    reason: UnassignedReason::Disabled,
                },
                None,
            )
        };

        if assignment.is_some() {
            trip.state = state_machine::ensure(trip.state, TripEvent::Assign)?;
        }
        ledger.open_trip(trip.clone(), assignment.clone())?;

        Ok(TripCreated {
            trip: trip.clone(),
            assignment,
            outcome,
        })
    })?;

    state.metrics.record_transition("create");
    match &created.outcome {
        AssignmentOutcome::Assigned { driver_id, vehicle_id } => {
            state.metrics.record_assignment("auto", "assigned");
            state.metrics.record_transition(TripEvent::Assign.as_str());
            notify::emit(state, notify::trip_assigned(state, &created.trip, *driver_id));

            info!(
                trip_id = %created.trip.id,
                driver_id = %driver_id,
                vehicle_id = %vehicle_id,
                scheduled_for = %created.trip.scheduled_for,
                "trip created and auto-assigned"
            );
        }
        AssignmentOutcome::Unassigned { reason } => {
            state.metrics.record_assignment("auto", "unassigned");

            info!(
                trip_id = %created.trip.id,
                reason = ?reason,
                scheduled_for = %created.trip.scheduled_for,
                "trip created without assignment"
            );
        }
    }
    state
        .metrics
        .observe_latency("create_trip", started.elapsed().as_secs_f64());

    Ok(created)
}

fn visible_to(ledger: &Ledger, caller: &Claims, trip: &Trip) -> bool {
    match caller.role {
        Role::Supervisor | Role::Admin => caller.hotel_id == Some(trip.hotel_id),
        Role::Driver => {
            trip.requested_by == caller.subject_id
                || ledger
                    .assignment_for(trip.id)
                    .is_some_and(|assignment| assignment.driver_id == caller.subject_id)
        }
        Role::Requester => trip.requested_by == caller.subject_id,
    }
}

/// Trips the caller may see, newest scheduled first.
pub fn list_trips(
    state: &AppState,
    caller: &Claims,
    filter: &TripFilter,
) -> Result<Vec<Trip>, AppError> {
    if let (Some(from), Some(to)) = (filter.from, filter.to) {
        if from > to {
            return Err(AppError::Validation("from must not be after to".to_string()));
        }
    }
    if caller.role.is_supervisory() {
        caller.hotel()?;
    }

    let mut trips = state.store.read(|ledger| {
        ledger
            .trips()
            .filter(|trip| filter.matches(trip) && visible_to(ledger, caller, trip))
            .cloned()
            .collect::<Vec<_>>()
    })?;

    trips.sort_by(|a, b| {
        b.scheduled_for
            .cmp(&a.scheduled_for)
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(trips)
}

pub fn get_trip(state: &AppState, caller: &Claims, trip_id: Uuid) -> Result<TripDetail, AppError> {
    state.store.read(|ledger| -> Result<TripDetail, AppError> {
        let trip = ledger.trip(trip_id)?;
        if !visible_to(ledger, caller, trip) {
            return Err(AppError::Forbidden(format!(
                "trip {trip_id} is not visible to the caller"
            )));
        }

        Ok(TripDetail {
            trip: trip.clone(),
            assignment: ledger.assignment_for(trip_id).cloned(),
        })
    })?
}

fn ensure_assigned_driver(ledger: &Ledger, caller: &Claims, trip_id: Uuid) -> Result<(), AppError> {
    match ledger.assignment_for(trip_id) {
        Some(assignment) if assignment.driver_id == caller.subject_id => Ok(()),
        _ => Err(AppError::Forbidden(format!(
            "trip {trip_id} is not assigned to the caller"
        ))),
    }
}

/// Runs a driver-initiated transition that keeps the assignment and stamps
/// one of its lifecycle timestamps.
fn driver_advance<F>(
    state: &AppState,
    caller: &Claims,
    trip_id: Uuid,
    event: TripEvent,
    stamp: F,
) -> Result<TripDetail, AppError>
where
    F: FnOnce(&mut Assignment),
{
    caller.require_driver()?;

    let (trip, assignment) = state.store.transaction(|ledger| {
        let current = ledger.trip(trip_id)?.state;
        ensure_assigned_driver(ledger, caller, trip_id)?;
        let next = state_machine::ensure(current, event)?;

        ledger.advance(trip_id, next, stamp)
    })?;

    state.metrics.record_transition(event.as_str());
    info!(
        trip_id = %trip.id,
        driver_id = %caller.subject_id,
        event = %event,
        state = ?trip.state,
        "trip transitioned"
    );

    Ok(TripDetail {
        trip,
        assignment: Some(assignment),
    })
}

pub fn accept_trip(state: &AppState, caller: &Claims, trip_id: Uuid) -> Result<TripDetail, AppError> {
    let now = Utc::now();
    let detail = driver_advance(state, caller, trip_id, TripEvent::Accept, |assignment| {
        assignment.accepted_at = Some(now);
    })?;

    notify::emit(state, notify::trip_accepted(state, &detail.trip));
    Ok(detail)
}

pub fn start_trip(state: &AppState, caller: &Claims, trip_id: Uuid) -> Result<TripDetail, AppError> {
    let now = Utc::now();
    driver_advance(state, caller, trip_id, TripEvent::Start, |assignment| {
        assignment.started_at = Some(now);
    })
}

pub fn finish_trip(state: &AppState, caller: &Claims, trip_id: Uuid) -> Result<TripDetail, AppError> {
    let now = Utc::now();
    driver_advance(state, caller, trip_id, TripEvent::Finish, |assignment| {
        assignment.completed_at = Some(now);
    })
}

/// The assigned driver declines; the trip goes back to the pending pool.
pub fn reject_trip(state: &AppState, caller: &Claims, trip_id: Uuid) -> Result<Trip, AppError> {
    caller.require_driver()?;

    let (trip, _released) = state.store.transaction(|ledger| {
        let current = ledger.trip(trip_id)?.state;
        ensure_assigned_driver(ledger, caller, trip_id)?;
        let next = state_machine::ensure(current, TripEvent::Reject)?;

        ledger.release_assignment(trip_id, next)
    })?;

    state.metrics.record_transition(TripEvent::Reject.as_str());
    info!(trip_id = %trip.id, driver_id = %caller.subject_id, "trip rejected by driver");

    Ok(trip)
}

pub fn cancel_trip(state: &AppState, caller: &Claims, trip_id: Uuid) -> Result<Trip, AppError> {
    let (trip, released) = state.store.transaction(|ledger| {
        let trip = ledger.trip(trip_id)?;

        match caller.role {
            Role::Requester | Role::Driver => {
                if trip.requested_by != caller.subject_id {
                    return Err(AppError::Forbidden(format!(
                        "trip {trip_id} was requested by someone else"
                    )));
                }
                if trip.state != TripState::Pending {
                    return Err(AppError::InvalidTransition(format!(
                        "only pending trips can be cancelled by their requester, trip is {:?}",
                        trip.state
                    )));
                }
            }
            Role::Supervisor | Role::Admin => {
                let hotel_id = caller.require_supervisor()?;
                if trip.hotel_id != hotel_id {
                    return Err(AppError::Forbidden(format!(
                        "trip {trip_id} belongs to another hotel"
                    )));
                }
            }
        }

        let next = state_machine::ensure(trip.state, TripEvent::Cancel)?;
        ledger.release_assignment(trip_id, next)
    })?;

    state.metrics.record_transition(TripEvent::Cancel.as_str());
    info!(
        trip_id = %trip.id,
        cancelled_by = %caller.subject_id,
        released_driver = ?released.map(|assignment| assignment.driver_id),
        "trip cancelled"
    );

    Ok(trip)
}

/// Assignments the caller may see, most recently assigned first.
pub fn list_assignments(state: &AppState, caller: &Claims) -> Result<Vec<Assignment>, AppError> {
    let mut assignments = match caller.role {
        Role::Supervisor | Role::Admin => {
            let hotel_id = caller.require_supervisor()?;
            state.store.read(|ledger| {
                ledger
                    .assignments()
                    .filter(|assignment| {
                        ledger
                            .trip(assignment.trip_id)
                            .is_ok_and(|trip| trip.hotel_id == hotel_id)
                    })
                    .cloned()
                    .collect::<Vec<_>>()
            })?
        }
        Role::Driver => state.store.read(|ledger| {
            ledger
                .assignments()
                .filter(|assignment| assignment.driver_id == caller.subject_id)
                .cloned()
                .collect::<Vec<_>>()
        })?,
        Role::Requester => {
            return Err(AppError::Forbidden(
                "requesters cannot list assignments".to_string(),
            ));
        }
    };

    assignments.sort_by(|a, b| {
        b.assigned_at
            .cmp(&a.assigned_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(assignments)
}
