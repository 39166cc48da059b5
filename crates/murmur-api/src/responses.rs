//! Turning DB rows into API responses, including population of the identity
//! references embedded in posts and notifications.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use murmur_db::Database;
use murmur_db::models::{NotificationRow, PostRow, UserRow};
use murmur_types::api::{
    CommentAuthor, CommentResponse, NotificationResponse, NotificationSender, PostAuthor,
    PostResponse, UserResponse,
};
use murmur_types::models::NotificationKind;

pub fn user_response(db: &Database, row: UserRow) -> Result<UserResponse> {
    let followers = db.get_followers(&row.id)?;
    let following = db.get_following(&row.id)?;
    let liked_posts = db.get_liked_post_ids(&row.id)?;

    Ok(UserResponse {
        id: parse_uuid(&row.id, "user"),
        username: row.username,
        full_name: row.full_name,
        email: row.email,
        profile_img: row.profile_img,
        cover_img: row.cover_img,
        bio: row.bio,
        link: row.link,
        followers: parse_uuids(&followers, "follower"),
        following: parse_uuids(&following, "followee"),
        liked_posts: parse_uuids(&liked_posts, "liked post"),
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    })
}

pub fn post_response(db: &Database, row: PostRow) -> Result<PostResponse> {
    let id = row.id.clone();
    populate_posts(db, vec![row])?
        .pop()
        .ok_or_else(|| anyhow::anyhow!("author of post {} is missing", id))
}

/// Attach likes, comments and author projections to a page of posts,
/// preserving the input order. Three batch queries regardless of page size.
pub fn populate_posts(db: &Database, rows: Vec<PostRow>) -> Result<Vec<PostResponse>> {
    let post_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let like_rows = db.get_likes_for_posts(&post_ids)?;
    let comment_rows = db.get_comments_for_posts(&post_ids)?;

    let mut user_ids: Vec<String> = rows
        .iter()
        .map(|r| r.user_id.clone())
        .chain(comment_rows.iter().map(|c| c.user_id.clone()))
        .collect();
    user_ids.sort();
    user_ids.dedup();
    let users: HashMap<String, UserRow> = db
        .get_users_by_ids(&user_ids)?
        .into_iter()
        .map(|u| (u.id.clone(), u))
        .collect();

    let mut likes: HashMap<String, Vec<Uuid>> = HashMap::new();
    for like in &like_rows {
        likes
            .entry(like.post_id.clone())
            .or_default()
            .push(parse_uuid(&like.user_id, "liker"));
    }

    let mut comments: HashMap<String, Vec<CommentResponse>> = HashMap::new();
    for comment in comment_rows {
        let Some(author) = users.get(&comment.user_id) else {
            warn!("Comment {} references missing user {}", comment.id, comment.user_id);
            continue;
        };
        comments
            .entry(comment.post_id.clone())
            .or_default()
            .push(CommentResponse {
                id: parse_uuid(&comment.id, "comment"),
                text: comment.text,
                user: comment_author(author),
                created_at: parse_timestamp(&comment.created_at),
            });
    }

    let posts = rows
        .into_iter()
        .filter_map(|row| {
            let Some(author) = users.get(&row.user_id) else {
                warn!("Post {} references missing user {}", row.id, row.user_id);
                return None;
            };
            Some(PostResponse {
                id: parse_uuid(&row.id, "post"),
                user: post_author(author),
                likes: likes.remove(&row.id).unwrap_or_default(),
                comments: comments.remove(&row.id).unwrap_or_default(),
                text: row.text,
                img: row.img,
                created_at: parse_timestamp(&row.created_at),
                updated_at: parse_timestamp(&row.updated_at),
            })
        })
        .collect();

    Ok(posts)
}

pub fn notification_response(row: NotificationRow) -> NotificationResponse {
    let kind = row.kind.parse().unwrap_or_else(|e| {
        warn!("Notification {}: {}", row.id, e);
        NotificationKind::Like
    });

    NotificationResponse {
        id: parse_uuid(&row.id, "notification"),
        from: NotificationSender {
            id: parse_uuid(&row.from_id, "sender"),
            username: row.from_username,
            profile_img: row.from_profile_img,
        },
        to: parse_uuid(&row.to_id, "recipient"),
        kind,
        read: row.read,
        created_at: parse_timestamp(&row.created_at),
    }
}

fn post_author(user: &UserRow) -> PostAuthor {
    PostAuthor {
        id: parse_uuid(&user.id, "user"),
        username: user.username.clone(),
        full_name: user.full_name.clone(),
        email: user.email.clone(),
        profile_img: user.profile_img.clone(),
        cover_img: user.cover_img.clone(),
        bio: user.bio.clone(),
        link: user.link.clone(),
    }
}

fn comment_author(user: &UserRow) -> CommentAuthor {
    CommentAuthor {
        id: parse_uuid(&user.id, "user"),
        username: user.username.clone(),
        profile_img: user.profile_img.clone(),
    }
}

fn parse_uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} id '{}': {}", what, raw, e);
        Uuid::default()
    })
}

fn parse_uuids(raw: &[String], what: &str) -> Vec<Uuid> {
    raw.iter().map(|id| parse_uuid(id, what)).collect()
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by hand may use SQLite's "YYYY-MM-DD HH:MM:SS".
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_in_both_formats() {
        let iso = parse_timestamp("2024-03-01T12:30:45.123Z");
        let plain = parse_timestamp("2024-03-01 12:30:45");
        assert_eq!(iso.timestamp(), plain.timestamp());
        assert_eq!(parse_timestamp("yesterday"), DateTime::<Utc>::default());
    }

    #[test]
    fn populated_comments_hide_private_fields() {
        let db = Database::open_in_memory().unwrap();
        let alice = Uuid::new_v4().to_string();
        let bob = Uuid::new_v4().to_string();
        let post = Uuid::new_v4().to_string();
        db.create_user(&alice, "alice", "alice@example.com", "hash", "Alice A").unwrap();
        db.create_user(&bob, "bob", "bob@example.com", "hash", "Bob B").unwrap();
        db.create_post(&post, &alice, Some("hi"), None).unwrap();
        db.add_comment(&Uuid::new_v4().to_string(), &post, &bob, "hey").unwrap();
        db.toggle_like(&post, &bob).unwrap();

        let row = db.get_post(&post).unwrap().unwrap();
        let populated = post_response(&db, row).unwrap();
        assert_eq!(populated.user.username, "alice");
        assert_eq!(populated.likes, vec![bob.parse::<Uuid>().unwrap()]);
        assert_eq!(populated.comments.len(), 1);

        let json = serde_json::to_value(&populated).unwrap();
        let comment_user = &json["comments"][0]["user"];
        assert_eq!(comment_user["username"], "bob");
        assert!(comment_user.get("email").is_none());
        assert!(comment_user.get("full_name").is_none());
        assert!(json["user"].get("password").is_none());
    }
}
