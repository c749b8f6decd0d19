use thiserror::Error;
use uuid::Uuid;

use super::entry::{GroupKey, TempPackageId};

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("service {0} is not in the catalog")]
    UnknownService(Uuid),

    #[error("order {0} is not an active order of this patient")]
    UnknownOrder(Uuid),

    #[error("temp package {0} does not exist in this draft")]
    UnknownTempPackage(TempPackageId),

    #[error("package {key} belongs to service {expected}, not {actual}")]
    ServiceMismatch {
        key: GroupKey,
        expected: Uuid,
        actual: Uuid,
    },

    #[error("package {0} has a reserved appointment waiting for confirmation")]
    PendingReservation(GroupKey),

    #[error("package {key} is complete ({total} sessions)")]
    PackageComplete { key: GroupKey, total: i32 },

    #[error("session index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("price must be >= 0, got {0}")]
    InvalidPrice(i32),

    #[error("price of package {0} cannot be overridden")]
    PriceNotEditable(GroupKey),

    #[error("invalid session operations: {0}")]
    InvalidOperations(String),

    #[error("invalid draft: {0}")]
    InvalidDraft(String),
}
