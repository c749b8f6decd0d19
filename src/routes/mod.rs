use crate::models::AppState;
use axum::Router;

pub mod appointment_routes;
pub mod patient_routes;
pub mod service_routes;
pub mod session_draft_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1/services", service_routes::router())
        .nest("/api/v1", patient_routes::router())
        .nest("/api/v1", session_draft_routes::router())
        .nest("/api/v1", appointment_routes::router())
        .with_state(state)
}
