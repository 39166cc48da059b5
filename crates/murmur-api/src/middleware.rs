use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;

use murmur_db::models::UserRow;

use crate::auth::{SESSION_COOKIE, decode_token};
use crate::error::ApiError;
use crate::{AppState, run_blocking};

/// The identity behind the session cookie, loaded fresh for this request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRow);

/// Resolve the session cookie to a stored identity, or reject with 401.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::MissingToken)?;

    let claims = decode_token(&state.jwt_secret, &token).map_err(|e| {
        debug!("Rejected session token: {}", e);
        ApiError::InvalidToken
    })?;

    let user_id = claims.sub.to_string();
    let user = run_blocking(&state, move |db| db.get_user_by_id(&user_id))
        .await?
        .ok_or(ApiError::SessionUserGone)?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}
