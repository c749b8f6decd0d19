// src/routes/service_routes.rs

use axum::{Json, Router, extract::State, routing::get};

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState},
    scheduling::ServiceInfo,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_services))
}

/// Active catalog; `default_sessions` is the size of a new package.
pub async fn list_services(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<ServiceInfo>>>, ApiError> {
    let services = state.store.active_services().await?;
    Ok(Json(ApiOk { data: services }))
}
