use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use murmur_types::api::ErrorResponse;

/// Every way a request can fail. Client errors carry a short message that is
/// returned as `{"error": "..."}`; internal faults are logged and hidden.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid email format")]
    InvalidEmail,
    #[error("Username must be between 3 and 32 characters")]
    InvalidUsername,
    #[error("Full name is required")]
    MissingFullName,
    #[error("Username is already taken")]
    UsernameTaken,
    #[error("Email is already in use")]
    EmailTaken,
    #[error("Password must be at least 6 characters")]
    PasswordTooShort,
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Unauthorized: No token provided")]
    MissingToken,
    #[error("Unauthorized: Invalid token")]
    InvalidToken,
    #[error("User not found")]
    SessionUserGone,

    #[error("Invalid id")]
    InvalidId,
    #[error("User not found")]
    UserNotFound,
    #[error("Post not found")]
    PostNotFound,
    #[error("Notification not found")]
    NotificationNotFound,

    #[error("Post must contain text or image")]
    EmptyPost,
    #[error("Comment must contain text")]
    EmptyComment,
    #[error("Invalid image data")]
    InvalidImage,
    #[error("You are not authorized to delete this post")]
    NotPostOwner,
    #[error("You are not authorized to delete this notification")]
    NotNotificationOwner,
    #[error("You can't follow yourself")]
    SelfFollow,

    #[error("Please provide both current and new password")]
    PasswordPairRequired,
    #[error("Current password is incorrect")]
    IncorrectCurrentPassword,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidEmail
            | Self::InvalidUsername
            | Self::MissingFullName
            | Self::UsernameTaken
            | Self::EmailTaken
            | Self::PasswordTooShort
            | Self::InvalidId
            | Self::EmptyPost
            | Self::EmptyComment
            | Self::InvalidImage
            | Self::SelfFollow
            | Self::PasswordPairRequired => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials
            | Self::MissingToken
            | Self::InvalidToken
            | Self::SessionUserGone
            | Self::IncorrectCurrentPassword => StatusCode::UNAUTHORIZED,
            Self::NotPostOwner | Self::NotNotificationOwner => StatusCode::FORBIDDEN,
            Self::UserNotFound | Self::PostNotFound | Self::NotificationNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(e) = &self {
            error!("Request failed: {:#}", e);
        }

        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
