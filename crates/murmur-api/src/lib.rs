pub mod auth;
pub mod error;
pub mod media;
pub mod middleware;
pub mod notifications;
pub mod posts;
pub mod responses;
pub mod users;
pub mod validation;

use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::error;

use murmur_db::Database;

use crate::error::ApiError;
use crate::media::ImageStore;
use crate::middleware::require_auth;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub images: ImageStore,
    /// Adds the `Secure` attribute to the session cookie.
    pub secure_cookies: bool,
}

/// Build the full HTTP surface: JSON routes under `/api` and uploaded images
/// under `/media`.
pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/me", get(auth::me))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout));

    let post_routes = Router::new()
        .route("/all", get(posts::get_all_posts))
        .route("/following", get(posts::get_following_posts))
        .route("/likes/{id}", get(posts::get_liked_posts))
        .route("/user/{username}", get(posts::get_user_posts))
        .route("/create", post(posts::create_post))
        .route("/like/{id}", post(posts::like_unlike_post))
        .route("/comment/{id}", post(posts::comment_on_post))
        .route("/{id}", delete(posts::delete_post))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let user_routes = Router::new()
        .route("/profile/{username}", get(users::get_user_profile))
        .route("/suggested", get(users::get_suggested_users))
        .route("/follow/{id}", post(users::follow_unfollow_user))
        .route("/update", post(users::update_user))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let notification_routes = Router::new()
        .route(
            "/",
            get(notifications::get_notifications).delete(notifications::delete_notifications),
        )
        .route("/{id}", delete(notifications::delete_notification))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let media = ServeDir::new(state.images.dir());

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/posts", post_routes)
        .nest("/api/users", user_routes)
        .nest("/api/notifications", notification_routes)
        .nest_service("/media", media)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
        .map_err(ApiError::from)
}
