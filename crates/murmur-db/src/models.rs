/// Database row types. Each maps directly to one SQLite row.
/// Distinct from murmur-types API models to keep the DB layer independent.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string.
    pub password: String,
    pub full_name: String,
    pub bio: String,
    pub link: String,
    pub profile_img: String,
    pub cover_img: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct PostRow {
    pub id: String,
    pub user_id: String,
    pub text: Option<String>,
    pub img: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub text: String,
    pub created_at: String,
}

pub struct LikeRow {
    pub post_id: String,
    pub user_id: String,
}

/// A notification joined with the sender's public fields.
#[derive(Debug, Clone)]
pub struct NotificationRow {
    pub id: String,
    pub from_id: String,
    pub from_username: String,
    pub from_profile_img: String,
    pub to_id: String,
    pub kind: String,
    pub read: bool,
    pub created_at: String,
}
