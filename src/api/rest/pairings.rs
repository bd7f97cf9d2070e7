use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Claims;
use crate::engine::pairing::{self, PairingChange};
use crate::engine::trips;
use crate::error::AppError;
use crate::models::assignment::Assignment;
use crate::models::pairing::Pairing;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/pairings", post(pair_driver_vehicle).get(list_open_pairings))
        .route("/pairings/:id/close", post(unpair_driver_vehicle))
        .route("/assignments", get(list_assignments))
}

#[derive(Deserialize)]
pub struct PairRequest {
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
}

async fn pair_driver_vehicle(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Json(payload): Json<PairRequest>,
) -> Result<(StatusCode, Json<PairingChange>), AppError> {
    let change = pairing::pair(&state, &claims, payload.driver_id, payload.vehicle_id)?;
    Ok((StatusCode::CREATED, Json(change)))
}

async fn list_open_pairings(
    State(state): State<Arc<AppState>>,
    claims: Claims,
) -> Result<Json<Vec<Pairing>>, AppError> {
    Ok(Json(pairing::list_open_pairings(&state, &claims)?))
}

async fn unpair_driver_vehicle(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(id): Path<Uuid>,
) -> Result<Json<Pairing>, AppError> {
    Ok(Json(pairing::unpair(&state, &claims, id)?))
}

async fn list_assignments(
    State(state): State<Arc<AppState>>,
    claims: Claims,
) -> Result<Json<Vec<Assignment>>, AppError> {
    Ok(Json(trips::list_assignments(&state, &claims)?))
}
