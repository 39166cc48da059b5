use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use murmur_db::PostFilter;
use murmur_types::api::{CommentRequest, CreatePostRequest, MessageResponse};
use murmur_types::models::NotificationKind;

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::{AppState, responses, run_blocking, validation};

pub async fn create_post(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let text = validation::non_empty(req.text);
    let img = validation::non_empty(req.img);
    if text.is_none() && img.is_none() {
        return Err(ApiError::EmptyPost);
    }

    let img = match img {
        Some(data_url) => Some(state.images.upload(&data_url).await?),
        None => None,
    };

    let post_id = Uuid::new_v4().to_string();
    let post = run_blocking(&state, move |db| {
        db.create_post(&post_id, &me.id, text.as_deref(), img.as_deref())?;
        let row = db
            .get_post(&post_id)?
            .ok_or_else(|| anyhow::anyhow!("post {} missing right after insert", post_id))?;
        responses::post_response(db, row)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let post_id = validation::id(&id)?;

    let pid = post_id.clone();
    let post = run_blocking(&state, move |db| db.get_post(&pid))
        .await?
        .ok_or(ApiError::PostNotFound)?;

    if post.user_id != me.id {
        warn!("{} tried to delete post {} owned by {}", me.username, post.id, post.user_id);
        return Err(ApiError::NotPostOwner);
    }

    // Not transactional with the row delete: a failed destroy leaves an orphaned file
    if let Some(img) = &post.img {
        state.images.discard(img).await;
    }

    run_blocking(&state, move |db| db.delete_post(&post_id)).await?;
    info!("Post {} deleted by {}", post.id, me.username);

    Ok(Json(MessageResponse::new("Post deleted successfully")))
}

pub async fn comment_on_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Json(req): Json<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let text = req.text.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::EmptyComment);
    }
    let post_id = validation::id(&id)?;

    let post = run_blocking(&state, move |db| {
        if db.get_post(&post_id)?.is_none() {
            return Ok(None);
        }
        db.add_comment(&Uuid::new_v4().to_string(), &post_id, &me.id, &text)?;
        match db.get_post(&post_id)? {
            Some(row) => responses::post_response(db, row).map(Some),
            None => Ok(None),
        }
    })
    .await?
    .ok_or(ApiError::PostNotFound)?;

    Ok(Json(post))
}

/// Like the post if the caller hasn't yet, otherwise unlike it. Responds with
/// the post's like list after the toggle.
pub async fn like_unlike_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let post_id = validation::id(&id)?;

    let pid = post_id.clone();
    let uid = me.id.clone();
    let (post, liked) = run_blocking(&state, move |db| {
        let Some(post) = db.get_post(&pid)? else {
            return Ok(None);
        };
        let liked = db.toggle_like(&pid, &uid)?;
        Ok(Some((post, liked)))
    })
    .await?
    .ok_or(ApiError::PostNotFound)?;

    // Separate write: a failure here leaves the like recorded without its notification
    if liked && post.user_id != me.id {
        let from = me.id.clone();
        run_blocking(&state, move |db| {
            db.create_notification(
                &Uuid::new_v4().to_string(),
                &from,
                &post.user_id,
                NotificationKind::Like.as_str(),
            )
        })
        .await?;
    }

    let likes = run_blocking(&state, move |db| db.get_likes(&post_id)).await?;
    let likes: Vec<Uuid> = likes.iter().filter_map(|id| id.parse().ok()).collect();

    Ok(Json(likes))
}

pub async fn get_all_posts(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let posts = run_blocking(&state, |db| {
        let rows = db.list_posts(PostFilter::All)?;
        responses::populate_posts(db, rows)
    })
    .await?;

    Ok(Json(posts))
}

pub async fn get_following_posts(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let posts = run_blocking(&state, move |db| {
        let rows = db.list_posts(PostFilter::FollowedBy(&me.id))?;
        responses::populate_posts(db, rows)
    })
    .await?;

    Ok(Json(posts))
}

pub async fn get_liked_posts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = validation::id(&id)?;

    let posts = run_blocking(&state, move |db| {
        if db.get_user_by_id(&user_id)?.is_none() {
            return Ok(None);
        }
        let rows = db.list_posts(PostFilter::LikedBy(&user_id))?;
        responses::populate_posts(db, rows).map(Some)
    })
    .await?
    .ok_or(ApiError::UserNotFound)?;

    Ok(Json(posts))
}

pub async fn get_user_posts(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let posts = run_blocking(&state, move |db| {
        let Some(user) = db.get_user_by_username(&username)? else {
            return Ok(None);
        };
        let rows = db.list_posts(PostFilter::ByAuthor(&user.id))?;
        responses::populate_posts(db, rows).map(Some)
    })
    .await?
    .ok_or(ApiError::UserNotFound)?;

    Ok(Json(posts))
}
