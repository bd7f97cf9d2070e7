//! Catalog maintenance: hotels, routes, users, vehicles and driver
//! availability.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{patch, post, put};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::Claims;
use crate::error::AppError;
use crate::models::fleet::{
    ActivityState, DriverAvailability, Hotel, Role, Route, User, Vehicle, VehicleStatus,
};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/hotels", post(create_hotel))
        .route("/routes", post(create_route))
        .route("/users", post(create_user))
        .route("/users/:id/status", patch(update_user_status))
        .route("/vehicles", post(create_vehicle))
        .route("/vehicles/:id/status", patch(update_vehicle_status))
        .route("/drivers/:id/availability", put(set_availability))
        .route("/shifts/start", post(start_shift))
        .route("/shifts/end", post(end_shift))
}

#[derive(Deserialize)]
pub struct CreateHotelRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct CreateRouteRequest {
    #[serde(default)]
    pub hotel_id: Option<Uuid>,
    pub name: String,
    pub origin: String,
    pub destination: String,
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub hotel_id: Option<Uuid>,
    pub role: Role,
    pub name: String,
}

#[derive(Deserialize)]
pub struct UpdateUserStatusRequest {
    #[serde(default)]
    pub activity: Option<ActivityState>,
    #[serde(default)]
    pub suspended: Option<bool>,
}

#[derive(Deserialize)]
pub struct CreateVehicleRequest {
    #[serde(default)]
    pub hotel_id: Option<Uuid>,
    pub plate: String,
}

#[derive(Deserialize)]
pub struct UpdateVehicleStatusRequest {
    pub status: VehicleStatus,
}

#[derive(Deserialize)]
pub struct AvailabilityRequest {
    pub weekly_available: bool,
}

/// Admins manage every hotel, supervisors only their own.
fn ensure_manages(claims: &Claims, hotel_id: Uuid) -> Result<(), AppError> {
    match claims.role {
        Role::Admin => Ok(()),
        Role::Supervisor if claims.hotel_id == Some(hotel_id) => Ok(()),
        Role::Supervisor => Err(AppError::Forbidden(format!(
            "hotel {hotel_id} is not managed by the caller"
        ))),
        Role::Requester | Role::Driver => Err(AppError::Forbidden(
            "supervisor or admin role required".to_string(),
        )),
    }
}

fn target_hotel(claims: &Claims, requested: Option<Uuid>) -> Result<Uuid, AppError> {
    let hotel_id = requested
        .or(claims.hotel_id)
        .ok_or_else(|| AppError::Validation("hotel_id is required".to_string()))?;
    ensure_manages(claims, hotel_id)?;
    Ok(hotel_id)
}

fn managed_user(state: &AppState, claims: &Claims, user_id: Uuid) -> Result<User, AppError> {
    let user = state.fleet.user(user_id)?;
    match user.hotel_id {
        Some(hotel_id) => ensure_manages(claims, hotel_id)?,
        None => claims.require_admin()?,
    }
    Ok(user)
}

async fn create_hotel(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Json(payload): Json<CreateHotelRequest>,
) -> Result<(StatusCode, Json<Hotel>), AppError> {
    claims.require_admin()?;
    let hotel = state.fleet.register_hotel(&payload.name)?;

    info!(hotel_id = %hotel.id, name = %hotel.name, "hotel registered");
    Ok((StatusCode::CREATED, Json(hotel)))
}

async fn create_route(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Json(payload): Json<CreateRouteRequest>,
) -> Result<(StatusCode, Json<Route>), AppError> {
    let hotel_id = target_hotel(&claims, payload.hotel_id)?;
    let route = state.fleet.register_route(
        hotel_id,
        &payload.name,
        &payload.origin,
        &payload.destination,
    )?;

    info!(route_id = %route.id, hotel_id = %hotel_id, name = %route.name, "route registered");
    Ok((StatusCode::CREATED, Json(route)))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let hotel_id = match payload.role {
        Role::Admin => {
            claims.require_admin()?;
            payload.hotel_id
        }
        Role::Requester | Role::Driver | Role::Supervisor => {
            Some(target_hotel(&claims, payload.hotel_id)?)
        }
    };
    let user = state
        .fleet
        .register_user(hotel_id, payload.role, &payload.name)?;

    info!(user_id = %user.id, role = ?user.role, hotel_id = ?user.hotel_id, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn update_user_status(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserStatusRequest>,
) -> Result<Json<User>, AppError> {
    managed_user(&state, &claims, id)?;
    let user = state
        .fleet
        .update_user_status(id, payload.activity, payload.suspended)?;

    info!(
        user_id = %user.id,
        activity = ?user.activity,
        suspended = user.suspended,
        "user status updated"
    );
    Ok(Json(user))
}

async fn create_vehicle(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Json(payload): Json<CreateVehicleRequest>,
) -> Result<(StatusCode, Json<Vehicle>), AppError> {
    let hotel_id = target_hotel(&claims, payload.hotel_id)?;
    let vehicle = state.fleet.register_vehicle(hotel_id, &payload.plate)?;

    info!(vehicle_id = %vehicle.id, plate = %vehicle.plate, "vehicle registered");
    Ok((StatusCode::CREATED, Json(vehicle)))
}

async fn update_vehicle_status(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateVehicleStatusRequest>,
) -> Result<Json<Vehicle>, AppError> {
    let vehicle = state.fleet.vehicle(id)?;
    ensure_manages(&claims, vehicle.hotel_id)?;
    let vehicle = state.fleet.update_vehicle_status(id, payload.status)?;

    info!(vehicle_id = %vehicle.id, status = ?vehicle.status, "vehicle status updated");
    Ok(Json(vehicle))
}

async fn set_availability(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(id): Path<Uuid>,
    Json(payload): Json<AvailabilityRequest>,
) -> Result<Json<DriverAvailability>, AppError> {
    managed_user(&state, &claims, id)?;
    let availability = state
        .fleet
        .set_weekly_availability(id, payload.weekly_available)?;

    info!(
        driver_id = %id,
        weekly_available = availability.weekly_available,
        "driver availability updated"
    );
    Ok(Json(availability))
}

async fn start_shift(
    State(state): State<Arc<AppState>>,
    claims: Claims,
) -> Result<Json<DriverAvailability>, AppError> {
    claims.require_driver()?;
    let availability = state.fleet.mark_shift(claims.subject_id, true)?;

    info!(driver_id = %claims.subject_id, "shift started");
    Ok(Json(availability))
}

async fn end_shift(
    State(state): State<Arc<AppState>>,
    claims: Claims,
) -> Result<Json<DriverAvailability>, AppError> {
    claims.require_driver()?;
    let availability = state.fleet.mark_shift(claims.subject_id, false)?;

    info!(driver_id = %claims.subject_id, "shift ended");
    Ok(Json(availability))
}
