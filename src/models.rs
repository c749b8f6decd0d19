use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::store::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub store: Arc<dyn SessionStore>,
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

/* -------------------------
   Enums
--------------------------*/

/// appointment.status smallint:
/// 0 reserved, 1 confirmed, 2 arrived, 3 seated, 4 dismissed, 5 cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "smallint")]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum AppointmentStatus {
    Reserved = 0,
    Confirmed = 1,
    Arrived = 2,
    Seated = 3,
    Dismissed = 4,
    Cancelled = 5,
}

impl AppointmentStatus {
    /// Cancelled appointments release their session numbers.
    pub fn holds_session_number(self) -> bool {
        self != AppointmentStatus::Cancelled
    }

    pub fn is_completed(self) -> bool {
        self == AppointmentStatus::Dismissed
    }
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ServiceCatalogRow {
    pub service_id: Uuid,
    pub service_type: String,
    pub display_number: i32,
    pub display_name: String,
    pub default_duration_min: Option<i32>,
    pub default_sessions: i32,
    pub price_cents: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ServiceOrderRow {
    pub order_id: Uuid,
    pub service_id: Uuid,
    pub total_sessions: i32,
    pub final_price_cents: Option<i32>,
}

/// Non-deleted appointment_service joined with its appointment.
#[derive(Debug, Clone, FromRow)]
pub struct OrderSessionRow {
    pub appointment_service_id: Uuid,
    pub order_id: Uuid,
    pub appointment_id: Uuid,
    pub session_number: i32,
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AppointmentServiceRow {
    pub appointment_service_id: Uuid,
    pub order_id: Option<Uuid>,
    pub service_id: Uuid,
    pub session_number: i32,
}

#[derive(Debug, Clone, FromRow)]
pub struct AppointmentRow {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_employee_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub priority: i16,
    pub note: Option<String>,
}

/* -------------------------
   Helpers
--------------------------*/

/// Roles (dcms_user.roles):
/// 0 Patient, 1 Admin, 2 Manager, 3 Doctor, 4 Receptionist
pub fn can_manage_appointments(role: i16) -> bool {
    matches!(role, 1 | 2 | 4)
}
