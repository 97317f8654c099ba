use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::rest::auth::AuthActor;
use crate::engine::audit::AuditEntry;
use crate::engine::pricing::estimate_price;
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/audit", get(audit_log))
        .route("/pricing/estimate", get(price_estimate))
}

#[derive(Deserialize)]
pub struct EstimateQuery {
    pub weight: f64,
    #[serde(default)]
    pub insured: bool,
}

#[derive(Serialize)]
pub struct EstimateResponse {
    pub weight: f64,
    pub insured: bool,
    pub amount: f64,
}

async fn audit_log(
    State(state): State<Arc<AppState>>,
    auth: AuthActor,
) -> Result<Json<Vec<AuditEntry>>, AppError> {
    Ok(Json(state.manager.audit_log(&auth.actor).await?))
}

async fn price_estimate(
    Query(query): Query<EstimateQuery>,
) -> Result<Json<EstimateResponse>, AppError> {
    let amount = estimate_price(query.weight, query.insured)?;
    Ok(Json(EstimateResponse {
        weight: query.weight,
        insured: query.insured,
        amount,
    }))
}
