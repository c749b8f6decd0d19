// src/routes/session_draft_routes.rs
//
// Stateless draft editing: the client sends the whole draft with one action
// and gets back the reconciled draft, its grouped view and the diff it would
// commit. Nothing is written here.

use axum::{
    extract::State,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState},
    scheduling::{
        GroupKey, PackageContext, PackageTarget, SessionDraft, SessionOperations,
        view::{DraftView, render},
    },
    store::load_context,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/session_drafts/load", post(load_draft))
        .route("/session_drafts/apply", post(apply_draft_action))
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct LoadDraftRequest {
    pub patient_id: Uuid,
    /// Omit for a new appointment.
    pub appointment_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DraftAction {
    AddSession {
        service_id: Uuid,
        target: PackageTarget,
    },
    RemoveSession {
        index: usize,
    },
    SetPrice {
        key: GroupKey,
        price: Option<i32>,
    },
}

#[derive(Debug, Deserialize)]
pub struct ApplyDraftRequest {
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub draft: SessionDraft,
    pub action: DraftAction,
}

#[derive(Debug, Serialize)]
pub struct DraftResponse {
    pub draft: SessionDraft,
    pub view: DraftView,
    pub operations: SessionOperations,
}

fn respond(draft: SessionDraft, ctx: &PackageContext) -> Result<Json<ApiOk<DraftResponse>>, ApiError> {
    let operations = draft.operations(ctx)?;
    Ok(Json(ApiOk {
        data: DraftResponse {
            view: render(&draft, ctx),
            operations,
            draft,
        },
    }))
}

pub fn apply_action(
    draft: &mut SessionDraft,
    action: DraftAction,
    ctx: &PackageContext,
) -> Result<(), ApiError> {
    match action {
        DraftAction::AddSession { service_id, target } => {
            draft.add_session(service_id, target, ctx)?;
        }
        DraftAction::RemoveSession { index } => {
            draft.remove_session(index, ctx)?;
        }
        DraftAction::SetPrice { key, price } => {
            draft.set_price_override(key, price)?;
        }
    }
    Ok(())
}

/* ============================================================
   POST /session_drafts/load
   ============================================================ */

pub async fn load_draft(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<LoadDraftRequest>,
) -> Result<Json<ApiOk<DraftResponse>>, ApiError> {
    auth.ensure_manage()?;

    let loaded = load_context(state.store.as_ref(), req.patient_id, req.appointment_id).await?;
    let draft = match req.appointment_id {
        Some(_) => SessionDraft::for_appointment(&loaded.sessions),
        None => SessionDraft::new(),
    };
    respond(draft, &loaded.ctx)
}

/* ============================================================
   POST /session_drafts/apply
   ============================================================ */

pub async fn apply_draft_action(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<ApplyDraftRequest>,
) -> Result<Json<ApiOk<DraftResponse>>, ApiError> {
    auth.ensure_manage()?;

    let loaded = load_context(state.store.as_ref(), req.patient_id, req.appointment_id).await?;
    let mut draft = req.draft;
    debug!(action = ?req.action, "applying draft action");
    apply_action(&mut draft, req.action, &loaded.ctx)?;
    respond(draft, &loaded.ctx)
}
