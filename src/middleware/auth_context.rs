use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{AppState, can_manage_appointments};

/// Authenticated staff member. Tokens are issued by the auth service; this
/// side only checks them.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: i16,
}

impl AuthContext {
    pub fn ensure_manage(&self) -> Result<(), ApiError> {
        if can_manage_appointments(self.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "FORBIDDEN",
                "Only admin/manager/receptionist can edit appointment sessions".into(),
            ))
        }
    }
}

/// Tokens are stored as SHA-256 hex.
pub fn hash_access_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, sqlx::FromRow)]
struct TokenOwnerRow {
    user_id: Uuid,
    roles: i16,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::session_expired())?;

            let row: TokenOwnerRow = sqlx::query_as::<_, TokenOwnerRow>(
                r#"
                SELECT st.user_id, u.roles
                FROM session_token st
                JOIN "dcms_user" u ON u.user_id = st.user_id
                WHERE st.session_token_hash = $1
                  AND st.revoked_at IS NULL
                  AND st.expires_at > now()
                  AND u.is_active = true
                "#,
            )
            .bind(hash_access_token(authz.token()))
            .fetch_optional(&state.db)
            .await
            .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
            .ok_or_else(ApiError::session_expired)?;

            Ok(AuthContext {
                user_id: row.user_id,
                role: row.roles,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_hash_is_sha256_hex() {
        assert_eq!(
            hash_access_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn doctors_cannot_edit_sessions() {
        let doctor = AuthContext {
            user_id: Uuid::nil(),
            role: 3,
        };
        assert!(doctor.ensure_manage().is_err());
        let receptionist = AuthContext {
            user_id: Uuid::nil(),
            role: 4,
        };
        assert!(receptionist.ensure_manage().is_ok());
    }
}
