use axum::{extract::FromRequestParts, http::request::Parts};
use bson::oid::ObjectId;

use crate::{error::ApiError, state::AppState};

/// Authenticated caller, extracted from the `Authorization: Bearer`
/// header. Handlers that take this reject unauthenticated requests
/// before their body runs.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: ObjectId,
    pub display_name: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("expected Bearer token".to_string()))?;

        let identity = state.auth.verify_access_token(token)?;

        Ok(AuthUser {
            user_id: identity.user_id,
            display_name: identity.display_name,
        })
    }
}

impl AuthUser {
    pub fn identity(&self) -> huddle_services::auth::Identity {
        huddle_services::auth::Identity {
            user_id: self.user_id,
            display_name: self.display_name.clone(),
        }
    }
}
