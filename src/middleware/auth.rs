use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::services::upstream::Upstream;
use crate::services::users::{self, LoggedUser};
use crate::state::AppState;

/// The caller's `Authorization` header, forwarded to the remote services
#[derive(Clone, Debug)]
pub struct UserToken(pub String);

/// Resolve the bearer token through control tower and attach the user to the request
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;

    let user = users::current_user(&state.upstream(Some(token.clone())))
        .await
        .map_err(|e| {
            tracing::info!("Could not resolve user from token: {}", e);
            ApiError::unauthorized("Unauthorized")
        })?;
    tracing::debug!(user_id = %user.id, "Authenticated request");

    request.extensions_mut().insert(user);
    request.extensions_mut().insert(UserToken(token));

    Ok(next.run(request).await)
}

/// Authenticated user, as attached by `require_user`
pub struct CurrentUser(pub LoggedUser);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<LoggedUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| ApiError::unauthorized("Unauthorized"))
    }
}

/// Upstream context authenticated as the caller
pub struct Caller(pub Upstream);

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .extensions
            .get::<UserToken>()
            .map(|t| t.0.clone())
            .ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;
        Ok(Caller(state.upstream(Some(token))))
    }
}
