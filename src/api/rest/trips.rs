use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Claims;
use crate::engine::manual;
use crate::engine::trips::{self, NewTrip, TripCreated, TripDetail, TripFilter};
use crate::error::AppError;
use crate::models::trip::Trip;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/trips", post(create_trip).get(list_trips))
        .route("/trips/:id", get(get_trip))
        .route("/trips/:id/assign", post(assign_trip))
        .route(
            "/trips/:id/assignment",
            put(reassign_trip).delete(unassign_trip),
        )
        .route("/trips/:id/accept", post(accept_trip))
        .route("/trips/:id/reject", post(reject_trip))
        .route("/trips/:id/start", post(start_trip))
        .route("/trips/:id/finish", post(finish_trip))
        .route("/trips/:id/cancel", post(cancel_trip))
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub driver_id: Uuid,
}

#[derive(Deserialize)]
pub struct ReassignRequest {
    pub driver_id: Uuid,
    #[serde(default)]
    pub vehicle_id: Option<Uuid>,
}

async fn create_trip(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Json(payload): Json<NewTrip>,
) -> Result<(StatusCode, Json<TripCreated>), AppError> {
    let created = trips::create_trip(&state, &claims, payload)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_trips(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Query(filter): Query<TripFilter>,
) -> Result<Json<Vec<Trip>>, AppError> {
    Ok(Json(trips::list_trips(&state, &claims, &filter)?))
}

async fn get_trip(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> Result<Json<TripDetail>, AppError> {
    Ok(Json(trips::get_trip(&state, &claims, id)?))
}

async fn assign_trip(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<TripDetail>, AppError> {
    Ok(Json(manual::assign_trip(&state, &claims, id, payload.driver_id)?))
}

async fn reassign_trip(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReassignRequest>,
) -> Result<Json<TripDetail>, AppError> {
    Ok(Json(manual::reassign_trip(
        &state,
        &claims,
        id,
        payload.driver_id,
        payload.vehicle_id,
    )?))
}

async fn unassign_trip(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(manual::unassign_trip(&state, &claims, id)?))
}

async fn accept_trip(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> Result<Json<TripDetail>, AppError> {
    Ok(Json(trips::accept_trip(&state, &claims, id)?))
}

async fn reject_trip(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(trips::reject_trip(&state, &claims, id)?))
}

async fn start_trip(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> Result<Json<TripDetail>, AppError> {
    Ok(Json(trips::start_trip(&state, &claims, id)?))
}

async fn finish_trip(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> Result<Json<TripDetail>, AppError> {
    Ok(Json(trips::finish_trip(&state, &claims, id)?))
}

async fn cancel_trip(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(trips::cancel_trip(&state, &claims, id)?))
}
