// src/routes/appointment_routes.rs

use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, AppointmentStatus},
    scheduling::{PackageContext, SessionDraft, SessionOperations},
    store::{NewAppointment, load_context},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", post(create_appointment))
        .route("/appointments/{appointment_id}", get(get_appointment))
        .route("/appointments/{appointment_id}/sessions", put(put_sessions))
        .route("/appointments/{appointment_id}/confirm", post(confirm_appointment))
        .route("/appointments/{appointment_id}/cancel", post(cancel_appointment))
}

/* ============================================================
   Response DTOs
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct AppointmentSessionDto {
    pub appointment_service_id: Uuid,
    pub order_id: Option<Uuid>,
    pub service_id: Uuid,
    pub service_name: Option<String>,
    pub session_number: i32,
}

#[derive(Debug, Serialize)]
pub struct AppointmentDetailDto {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_employee_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub priority: i16,
    pub note: Option<String>,
    pub sessions: Vec<AppointmentSessionDto>,
}

async fn load_detail(state: &AppState, appointment_id: Uuid) -> Result<AppointmentDetailDto, ApiError> {
    let appointment = state.store.appointment(appointment_id).await?;
    let rows = state.store.appointment_sessions(appointment_id).await?;
    let names: HashMap<Uuid, String> = state
        .store
        .active_services()
        .await?
        .into_iter()
        .map(|s| (s.service_id, s.display_name))
        .collect();

    Ok(AppointmentDetailDto {
        appointment_id: appointment.appointment_id,
        patient_id: appointment.patient_id,
        doctor_employee_id: appointment.doctor_employee_id,
        start_at: appointment.start_at,
        end_at: appointment.end_at,
        status: appointment.status,
        priority: appointment.priority,
        note: appointment.note,
        sessions: rows
            .into_iter()
            .map(|r| AppointmentSessionDto {
                service_name: names.get(&r.service_id).cloned(),
                appointment_service_id: r.appointment_service_id,
                order_id: r.order_id,
                service_id: r.service_id,
                session_number: r.session_number,
            })
            .collect(),
    })
}

/* ============================================================
   GET /appointments/{id}
   ============================================================ */

pub async fn get_appointment(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDetailDto>>, ApiError> {
    Ok(Json(ApiOk {
        data: load_detail(&state, appointment_id).await?,
    }))
}

/* ============================================================
   POST /appointments (create mode)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_employee_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub note: Option<String>,
    pub priority: Option<i16>, // 0 normal, 1 asap
    pub draft: SessionDraft,
}

/// Re-derives the diff server side; the client only sends its draft.
pub fn plan_new_appointment(
    draft: &SessionDraft,
    ctx: &PackageContext,
) -> Result<SessionOperations, ApiError> {
    draft.check_for_new_appointment(ctx)?;
    let ops = draft.operations(ctx)?;
    ops.validate()?;
    Ok(ops)
}

pub async fn create_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<Json<ApiOk<AppointmentDetailDto>>, ApiError> {
    auth.ensure_manage()?;

    if req.end_at <= req.start_at {
        return Err(ApiError::BadRequest("VALIDATION_ERROR", "end_at must be > start_at".into()));
    }
    let priority = req.priority.unwrap_or(0);
    if priority != 0 && priority != 1 {
        return Err(ApiError::BadRequest("VALIDATION_ERROR", "priority must be 0 or 1".into()));
    }

    let loaded = load_context(state.store.as_ref(), req.patient_id, None).await?;
    let ops = plan_new_appointment(&req.draft, &loaded.ctx)?;

    let appointment_id = state
        .store
        .create_appointment(
            NewAppointment {
                patient_id: req.patient_id,
                doctor_employee_id: req.doctor_employee_id,
                start_at: req.start_at,
                end_at: req.end_at,
                priority,
                note: req.note,
            },
            &ops,
            auth.user_id,
        )
        .await?;

    Ok(Json(ApiOk {
        data: load_detail(&state, appointment_id).await?,
    }))
}

/* ============================================================
   PUT /appointments/{id}/sessions (edit mode diff)
   ============================================================ */

pub async fn put_sessions(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(ops): Json<SessionOperations>,
) -> Result<Json<ApiOk<AppointmentDetailDto>>, ApiError> {
    auth.ensure_manage()?;
    ops.validate()?;

    if ops.is_empty() {
        return Ok(Json(ApiOk {
            data: load_detail(&state, appointment_id).await?,
        }));
    }

    let summary = state
        .store
        .apply_operations(appointment_id, &ops, auth.user_id)
        .await?;
    info!(%appointment_id, user_id = %auth.user_id, ?summary, "appointment sessions updated");

    Ok(Json(ApiOk {
        data: load_detail(&state, appointment_id).await?,
    }))
}

/* ============================================================
   Status transitions
   ============================================================ */

/// Allowed moves out of `from` for the two transitions this API owns.
pub fn check_transition(from: AppointmentStatus, to: AppointmentStatus) -> Result<(), ApiError> {
    let allowed = match to {
        AppointmentStatus::Confirmed => from == AppointmentStatus::Reserved,
        AppointmentStatus::Cancelled => matches!(
            from,
            AppointmentStatus::Reserved | AppointmentStatus::Confirmed
        ),
        _ => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(ApiError::Conflict(
            "INVALID_STATUS",
            format!("cannot move appointment from {from:?} to {to:?}"),
        ))
    }
}

async fn transition(
    state: &AppState,
    auth: &AuthContext,
    appointment_id: Uuid,
    to: AppointmentStatus,
) -> Result<Json<ApiOk<AppointmentDetailDto>>, ApiError> {
    auth.ensure_manage()?;

    let current = state.store.appointment(appointment_id).await?;
    check_transition(current.status, to)?;
    state.store.set_status(appointment_id, to, auth.user_id).await?;
    info!(%appointment_id, from = ?current.status, to = ?to, "appointment status changed");

    Ok(Json(ApiOk {
        data: load_detail(state, appointment_id).await?,
    }))
}

pub async fn confirm_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDetailDto>>, ApiError> {
    transition(&state, &auth, appointment_id, AppointmentStatus::Confirmed).await
}

/// Cancelling releases the appointment's session numbers.
pub async fn cancel_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDetailDto>>, ApiError> {
    transition(&state, &auth, appointment_id, AppointmentStatus::Cancelled).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::PackageTarget;
    use crate::scheduling::test_support::Fixture;

    #[test]
    fn only_reserved_appointments_can_be_confirmed() {
        assert!(check_transition(AppointmentStatus::Reserved, AppointmentStatus::Confirmed).is_ok());
        assert!(check_transition(AppointmentStatus::Confirmed, AppointmentStatus::Confirmed).is_err());
        assert!(check_transition(AppointmentStatus::Cancelled, AppointmentStatus::Confirmed).is_err());
    }

    #[test]
    fn finished_appointments_cannot_be_cancelled() {
        assert!(check_transition(AppointmentStatus::Confirmed, AppointmentStatus::Cancelled).is_ok());
        assert!(check_transition(AppointmentStatus::Dismissed, AppointmentStatus::Cancelled).is_err());
        assert!(check_transition(AppointmentStatus::Cancelled, AppointmentStatus::Cancelled).is_err());
    }

    #[test]
    fn new_appointment_plan_rejects_pending_orders_and_existing_sessions() {
        let fx = Fixture::new();
        let pending = fx.order(3, vec![(1, fx.other_appointment, AppointmentStatus::Reserved)]);
        let ctx = fx.context(None, vec![pending.clone()]);

        let raw = serde_json::json!({
            "entries": [{
                "service_id": fx.service_a,
                "session_number": 2,
                "kind": "new",
                "package": { "type": "order", "id": pending.order_id }
            }]
        });
        let draft: SessionDraft = serde_json::from_value(raw).unwrap();
        assert!(matches!(
            plan_new_appointment(&draft, &ctx),
            Err(ApiError::Conflict("PACKAGE_UNAVAILABLE", _))
        ));

        let raw = serde_json::json!({
            "entries": [{
                "service_id": fx.service_a,
                "session_number": 1,
                "kind": "existing",
                "appointment_service_id": Uuid::new_v4(),
                "order_id": pending.order_id
            }]
        });
        let draft: SessionDraft = serde_json::from_value(raw).unwrap();
        assert!(matches!(
            plan_new_appointment(&draft, &ctx),
            Err(ApiError::BadRequest("INVALID_DRAFT", _))
        ));
    }

    #[test]
    fn new_appointment_plan_creates_new_orders() {
        let fx = Fixture::new();
        let ctx = fx.context(None, vec![]);
        let mut draft = SessionDraft::new();
        draft
            .add_session(fx.service_a, PackageTarget::NewPackage, &ctx)
            .unwrap();

        let ops = plan_new_appointment(&draft, &ctx).unwrap();
        assert_eq!(ops.new_orders.len(), 1);
        assert_eq!(ops.to_create.len(), 1);
        assert!(ops.to_delete.is_empty());
    }

    #[test]
    fn create_request_carries_a_draft() {
        let raw = r#"{
            "patient_id": "00000000-0000-0000-0000-000000000001",
            "doctor_employee_id": "00000000-0000-0000-0000-000000000002",
            "start_at": "2026-11-02T09:00:00Z",
            "end_at": "2026-11-02T09:45:00Z",
            "note": null,
            "draft": {}
        }"#;
        let req: CreateAppointmentRequest = serde_json::from_str(raw).unwrap();
        assert!(req.draft.entries().is_empty());
        assert_eq!(req.priority, None);
    }
}
