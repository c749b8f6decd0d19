// src/routes/patient_routes.rs

use std::collections::HashSet;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState},
    scheduling::{PatientOrder, context::retain_active_orders},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/patients/{patient_id}/orders", get(list_active_orders))
}

/// Orders with sessions left, each with its booked sessions.
pub async fn list_active_orders(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiOk<Vec<PatientOrder>>>, ApiError> {
    let mut orders = state.store.patient_orders(patient_id).await?;
    retain_active_orders(&mut orders, &HashSet::new());
    Ok(Json(ApiOk { data: orders }))
}
