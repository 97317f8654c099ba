use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::api::rest::auth::AuthActor;
use crate::api::rest::decode_body;
use crate::engine::lifecycle::{OrderFilter, OrderStats};
use crate::error::AppError;
use crate::models::ids::{DriverId, OrderId};
use crate::models::order::{NewOrder, Order, OrderPatch, OrderStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/stats", get(order_stats))
        .route(
            "/orders/:id",
            get(get_order).put(edit_order).delete(delete_order),
        )
        .route("/orders/:id/assign", post(assign_driver))
        .route("/orders/:id/status", post(advance_status))
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub driver_id: DriverId,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    auth: AuthActor,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = state
        .manager
        .with_session(&auth.token)
        .list_orders(&auth.actor, &filter)
        .await?;
    Ok(Json(orders))
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    auth: AuthActor,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let payload: NewOrder = decode_body(body)?;
    let order = state
        .manager
        .with_session(&auth.token)
        .create_order(payload, &auth.actor)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn order_stats(
    State(state): State<Arc<AppState>>,
    auth: AuthActor,
) -> Result<Json<OrderStats>, AppError> {
    let stats = state
        .manager
        .with_session(&auth.token)
        .order_stats(&auth.actor)
        .await?;
    Ok(Json(stats))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    auth: AuthActor,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .manager
        .with_session(&auth.token)
        .get_order(&OrderId::new(id), &auth.actor)
        .await?;
    Ok(Json(order))
}

async fn edit_order(
    State(state): State<Arc<AppState>>,
    auth: AuthActor,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Order>, AppError> {
    let patch: OrderPatch = decode_body(body)?;
    let order = state
        .manager
        .with_session(&auth.token)
        .edit_order(&OrderId::new(id), &patch, &auth.actor)
        .await?;
    Ok(Json(order))
}

async fn delete_order(
    State(state): State<Arc<AppState>>,
    auth: AuthActor,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .manager
        .with_session(&auth.token)
        .delete_order(&OrderId::new(id), &auth.actor)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn assign_driver(
    State(state): State<Arc<AppState>>,
    auth: AuthActor,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Order>, AppError> {
    let request: AssignRequest = decode_body(body)?;
    let order = state
        .manager
        .with_session(&auth.token)
        .assign_driver(&OrderId::new(id), &request.driver_id, &auth.actor)
        .await?;
    Ok(Json(order))
}

async fn advance_status(
    State(state): State<Arc<AppState>>,
    auth: AuthActor,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Order>, AppError> {
    let request: StatusRequest = decode_body(body)?;
    let order = state
        .manager
        .with_session(&auth.token)
        .advance_status(&OrderId::new(id), request.status, &auth.actor)
        .await?;
    Ok(Json(order))
}
