use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand_core::OsRng;
use tracing::info;
use uuid::Uuid;

use murmur_types::api::{Claims, LoginRequest, MessageResponse, SignupRequest};

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::{AppState, responses, run_blocking, validation};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "jwt";

const SESSION_DAYS: i64 = 15;

/// Well-formed Argon2id hash with default parameters that no password matches.
/// Verified against when the username is unknown.
const LOGIN_DECOY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$Spu03Sl357XyrSBBivmbGA$526f9IbLis4lI8xWVabeHPs8UZyj0kMqLDq/W1B2kVA";

pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validation::email(&req.email)?;
    validation::username(&req.username)?;
    let full_name = req.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(ApiError::MissingFullName);
    }

    let username = req.username.clone();
    let email = req.email.clone();
    let (username_taken, email_taken) = run_blocking(&state, move |db| {
        Ok((
            db.get_user_by_username(&username)?.is_some(),
            db.get_user_by_email(&email)?.is_some(),
        ))
    })
    .await?;
    if username_taken {
        return Err(ApiError::UsernameTaken);
    }
    if email_taken {
        return Err(ApiError::EmailTaken);
    }

    validation::password(&req.password)?;
    let password_hash = hash_password(&req.password)?;

    let user_id = Uuid::new_v4();
    let id = user_id.to_string();
    let username = req.username.clone();
    let profile = run_blocking(&state, move |db| {
        db.create_user(&id, &username, &req.email, &password_hash, &full_name)?;
        let row = db
            .get_user_by_id(&id)?
            .ok_or_else(|| anyhow::anyhow!("user {} missing right after insert", id))?;
        responses::user_response(db, row)
    })
    .await?;

    let token = create_token(&state.jwt_secret, user_id, &profile.username)?;
    info!("New account {} ({})", profile.username, user_id);

    Ok((
        StatusCode::CREATED,
        jar.add(session_cookie(token, state.secure_cookies)),
        Json(profile),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.clone();
    let user = run_blocking(&state, move |db| db.get_user_by_username(&username)).await?;
    let Some(user) = user else {
        // Unknown usernames still pay for one Argon2 verification
        let _ = verify_password(&req.password, LOGIN_DECOY_HASH);
        return Err(ApiError::InvalidCredentials);
    };

    if !verify_password(&req.password, &user.password)? {
        return Err(ApiError::InvalidCredentials);
    }

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt user id '{}': {}", user.id, e))?;
    let token = create_token(&state.jwt_secret, user_id, &user.username)?;

    let profile = run_blocking(&state, move |db| responses::user_response(db, user)).await?;

    Ok((jar.add(session_cookie(token, state.secure_cookies)), Json(profile)))
}

pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let cleared = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::ZERO);

    (jar.add(cleared), Json(MessageResponse::new("Logged out successfully")))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = run_blocking(&state, move |db| responses::user_response(db, me)).await?;
    Ok(Json(profile))
}

/// Argon2id hash in PHC string form.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

/// False on mismatch; errors only if the stored hash is unreadable.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, ApiError> {
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("stored password hash is corrupt: {}", e))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn create_token(secret: &str, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(SESSION_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Checks signature and expiry.
pub fn decode_token(secret: &str, token: &str) -> jsonwebtoken::errors::Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .max_age(time::Duration::days(SESSION_DAYS))
        .build()
}
