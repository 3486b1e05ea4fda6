use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};

use crate::{error::ApiError, state::AppState};

/// Confirms the caller presented the configured API key. The HTTP surface
/// here has no notion of users or tenants — everything behind it is a
/// single operator's fleet of cameras — so this is the full extent of
/// authentication.
#[derive(Debug, Clone, Copy)]
pub struct ApiKeyAuth;

impl<S> FromRequestParts<S> for ApiKeyAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let provided = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .or_else(|| {
                parts
                    .headers
                    .get("x-api-key")
                    .and_then(|v| v.to_str().ok())
            })
            .ok_or_else(|| ApiError::Unauthorized("missing API key".to_string()))?;

        if provided != app_state.settings.api_key.key {
            return Err(ApiError::Unauthorized("invalid API key".to_string()));
        }

        Ok(ApiKeyAuth)
    }
}
