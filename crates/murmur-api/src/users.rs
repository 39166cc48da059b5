use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use murmur_types::api::{MessageResponse, UpdateProfileRequest};
use murmur_types::models::NotificationKind;

use crate::auth::{hash_password, verify_password};
use crate::error::ApiError;
use crate::media::DecodedImage;
use crate::middleware::CurrentUser;
use crate::{AppState, responses, run_blocking, validation};

/// How many random accounts to draw before dropping already-followed ones.
const SUGGESTION_SAMPLE_SIZE: u32 = 10;
/// Upper bound on suggestions returned.
const SUGGESTION_LIMIT: usize = 4;

pub async fn get_user_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = run_blocking(&state, move |db| match db.get_user_by_username(&username)? {
        Some(row) => responses::user_response(db, row).map(Some),
        None => Ok(None),
    })
    .await?
    .ok_or(ApiError::UserNotFound)?;

    Ok(Json(profile))
}

/// Follow the target if the caller doesn't yet, otherwise unfollow.
pub async fn follow_unfollow_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let target_id = validation::id(&id)?;
    if target_id == me.id {
        return Err(ApiError::SelfFollow);
    }

    let tid = target_id.clone();
    let uid = me.id.clone();
    let followed = run_blocking(&state, move |db| {
        if db.get_user_by_id(&tid)?.is_none() {
            return Ok(None);
        }
        db.toggle_follow(&uid, &tid).map(Some)
    })
    .await?
    .ok_or(ApiError::UserNotFound)?;

    if !followed {
        info!("{} unfollowed {}", me.username, target_id);
        return Ok(Json(MessageResponse::new("Unfollowed successfully")));
    }

    // Separate write: a failure here leaves the follow recorded without its notification
    let from = me.id.clone();
    let to = target_id.clone();
    run_blocking(&state, move |db| {
        db.create_notification(
            &Uuid::new_v4().to_string(),
            &from,
            &to,
            NotificationKind::Follow.as_str(),
        )
    })
    .await?;

    info!("{} followed {}", me.username, target_id);
    Ok(Json(MessageResponse::new("Followed successfully")))
}

/// A few random accounts the caller doesn't follow yet. May return fewer than
/// `SUGGESTION_LIMIT`, or none, when the sample is mostly followed accounts.
pub async fn get_suggested_users(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let suggestions = run_blocking(&state, move |db| {
        let following: HashSet<String> = db.get_following(&me.id)?.into_iter().collect();

        db.sample_users(&me.id, SUGGESTION_SAMPLE_SIZE)?
            .into_iter()
            .filter(|u| u.id != me.id && !following.contains(&u.id))
            .take(SUGGESTION_LIMIT)
            .map(|u| responses::user_response(db, u))
            .collect::<anyhow::Result<Vec<_>>>()
    })
    .await?;

    Ok(Json(suggestions))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(CurrentUser(mut user)): Extension<CurrentUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    match (
        validation::non_empty(req.current_password),
        validation::non_empty(req.new_password),
    ) {
        (Some(current), Some(new)) => {
            if !verify_password(&current, &user.password)? {
                return Err(ApiError::IncorrectCurrentPassword);
            }
            validation::password(&new)?;
            user.password = hash_password(&new)?;
        }
        (None, None) => {}
        _ => return Err(ApiError::PasswordPairRequired),
    }

    let new_username = validation::non_empty(req.username)
        .map(|u| u.trim().to_string())
        .filter(|u| *u != user.username);
    let new_email = validation::non_empty(req.email)
        .map(|e| e.trim().to_string())
        .filter(|e| *e != user.email);

    if let Some(username) = &new_username {
        validation::username(username)?;
    }
    if let Some(email) = &new_email {
        validation::email(email)?;
    }

    if new_username.is_some() || new_email.is_some() {
        let (username, email) = (new_username.clone(), new_email.clone());
        let (username_taken, email_taken) = run_blocking(&state, move |db| {
            let username_taken = match &username {
                Some(u) => db.get_user_by_username(u)?.is_some(),
                None => false,
            };
            let email_taken = match &email {
                Some(e) => db.get_user_by_email(e)?.is_some(),
                None => false,
            };
            Ok((username_taken, email_taken))
        })
        .await?;
        if username_taken {
            return Err(ApiError::UsernameTaken);
        }
        if email_taken {
            return Err(ApiError::EmailTaken);
        }
    }

    // Decode both images before destroying anything, so a rejected upload
    // leaves the stored ones alone
    let profile_img = validation::non_empty(req.profile_img)
        .map(|data_url| DecodedImage::from_data_url(&data_url))
        .transpose()?;
    let cover_img = validation::non_empty(req.cover_img)
        .map(|data_url| DecodedImage::from_data_url(&data_url))
        .transpose()?;

    if let Some(image) = profile_img {
        if !user.profile_img.is_empty() {
            state.images.discard(&user.profile_img).await;
        }
        user.profile_img = state.images.store(image).await?;
    }
    if let Some(image) = cover_img {
        if !user.cover_img.is_empty() {
            state.images.discard(&user.cover_img).await;
        }
        user.cover_img = state.images.store(image).await?;
    }

    if let Some(username) = new_username {
        user.username = username;
    }
    if let Some(email) = new_email {
        user.email = email;
    }
    if let Some(full_name) = validation::non_empty(req.full_name) {
        user.full_name = full_name.trim().to_string();
    }
    if let Some(bio) = validation::non_empty(req.bio) {
        user.bio = bio;
    }
    if let Some(link) = validation::non_empty(req.link) {
        user.link = link;
    }

    let profile = run_blocking(&state, move |db| {
        db.update_user(&user)?;
        let row = db
            .get_user_by_id(&user.id)?
            .ok_or_else(|| anyhow::anyhow!("user {} vanished during update", user.id))?;
        responses::user_response(db, row)
    })
    .await?;

    info!("Profile updated for {}", profile.username);
    Ok(Json(profile))
}
