use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::Claims;
use crate::error::AppError;
use crate::models::pairing::Pairing;
use crate::state::AppState;
use crate::store::Ledger;

#[derive(Debug, Clone, Serialize)]
pub struct PairingChange {
    pub pairing: Pairing,
    /// The driver's previous open pairing, closed by this change.
    pub closed: Option<Pairing>,
}

pub fn current_vehicle_of(ledger: &Ledger, driver_id: Uuid) -> Option<Uuid> {
    ledger
        .open_pairing_of_driver(driver_id)
        .map(|pairing| pairing.vehicle_id)
}

/// Hands `vehicle_id` to `driver_id`, closing the driver's previous pairing in
/// the same transaction.
pub fn pair(
    state: &AppState,
    caller: &Claims,
    driver_id: Uuid,
    vehicle_id: Uuid,
) -> Result<PairingChange, AppError> {
    let hotel_id = caller.require_supervisor()?;

    let driver = state.fleet.driver(driver_id)?;
    if driver.hotel_id != Some(hotel_id) {
        return Err(AppError::Validation(format!(
            "driver {driver_id} does not belong to this hotel"
        )));
    }

    let vehicle = state.fleet.vehicle(vehicle_id)?;
    if vehicle.hotel_id != hotel_id {
        return Err(AppError::Validation(format!(
            "vehicle {vehicle_id} does not belong to this hotel"
        )));
    }

    let change = state.store.transaction(|ledger| {
        if let Some(existing) = ledger.open_pairing_of_vehicle(vehicle_id) {
            return Err(if existing.driver_id == driver_id {
                AppError::Conflict(format!(
                    "driver {driver_id} is already paired with vehicle {vehicle_id}"
                ))
            } else {
                AppError::Conflict(format!(
                    "vehicle {vehicle_id} is paired with driver {}",
                    existing.driver_id
                ))
            });
        }

        let (pairing, closed) = ledger.open_pairing(driver_id, vehicle_id, Utc::now());
        Ok(PairingChange { pairing, closed })
    })?;

    info!(
        driver_id = %driver_id,
        vehicle_id = %vehicle_id,
        pairing_id = %change.pairing.id,
        closed_pairing = ?change.closed.as_ref().map(|pairing| pairing.id),
        "driver paired with vehicle"
    );

    Ok(change)
}

pub fn unpair(state: &AppState, caller: &Claims, pairing_id: Uuid) -> Result<Pairing, AppError> {
    let hotel_id = caller.require_supervisor()?;

    let closed = state.store.transaction(|ledger| {
        let pairing = ledger.pairing(pairing_id)?.clone();

        let driver = state.fleet.user(pairing.driver_id)?;
        if driver.hotel_id != Some(hotel_id) {
            return Err(AppError::Forbidden(format!(
                "pairing {pairing_id} belongs to another hotel"
            )));
        }

        if !pairing.is_open() {
            return Err(AppError::AlreadyClosed(pairing_id));
        }

        ledger
            .close_pairing(pairing_id, Utc::now())
            .ok_or(AppError::AlreadyClosed(pairing_id))
    })?;

    info!(
        pairing_id = %pairing_id,
        driver_id = %closed.driver_id,
        vehicle_id = %closed.vehicle_id,
        "pairing closed"
    );

    Ok(closed)
}

pub fn list_open_pairings(state: &AppState, caller: &Claims) -> Result<Vec<Pairing>, AppError> {
    let hotel_id = caller.require_supervisor()?;

    let mut pairings = state
        .store
        .read(|ledger| ledger.open_pairings().cloned().collect::<Vec<_>>())?;

    pairings.retain(|pairing| {
        state
            .fleet
            .user(pairing.driver_id)
            .map(|driver| driver.hotel_id == Some(hotel_id))
            .unwrap_or(false)
    });
    pairings.sort_by_key(|pairing| (pairing.started_at, pairing.id));

    Ok(pairings)
}
