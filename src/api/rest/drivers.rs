use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;

use crate::api::rest::auth::AuthActor;
use crate::api::rest::decode_body;
use crate::error::AppError;
use crate::models::driver::{Directory, Driver, DriverView, Person};
use crate::models::ids::DriverId;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", get(list_drivers).post(register_driver))
        .route("/drivers/:id/availability", get(driver_availability))
        .route("/directory/:kind", get(list_directory))
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    pub driver_id: DriverId,
    pub is_available: bool,
}

async fn list_drivers(
    State(state): State<Arc<AppState>>,
    auth: AuthActor,
) -> Result<Json<Vec<DriverView>>, AppError> {
    let drivers = state
        .manager
        .with_session(&auth.token)
        .list_drivers(&auth.actor)
        .await?;
    Ok(Json(drivers))
}

async fn register_driver(
    State(state): State<Arc<AppState>>,
    auth: AuthActor,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Driver>), AppError> {
    let driver: Driver = decode_body(body)?;
    let driver = state
        .manager
        .with_session(&auth.token)
        .register_driver(driver, &auth.actor)
        .await?;
    Ok((StatusCode::CREATED, Json(driver)))
}

async fn driver_availability(
    State(state): State<Arc<AppState>>,
    auth: AuthActor,
    Path(id): Path<String>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let driver_id = DriverId::new(id);
    let is_available = state
        .manager
        .with_session(&auth.token)
        .driver_availability(&driver_id, &auth.actor)
        .await?;

    Ok(Json(AvailabilityResponse {
        driver_id,
        is_available,
    }))
}

async fn list_directory(
    State(state): State<Arc<AppState>>,
    auth: AuthActor,
    Path(kind): Path<String>,
) -> Result<Json<Vec<Person>>, AppError> {
    let directory: Directory = kind.parse().map_err(AppError::NotFound)?;
    let people = state
        .manager
        .with_session(&auth.token)
        .list_directory(directory, &auth.actor)
        .await?;
    Ok(Json(people))
}
