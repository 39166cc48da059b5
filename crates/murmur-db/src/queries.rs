use crate::Database;
use crate::models::{CommentRow, LikeRow, NotificationRow, PostRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, Row, params, params_from_iter};

const USER_COLUMNS: &str = "id, username, email, password, full_name, bio, link, profile_img, cover_img, created_at, updated_at";

const POST_COLUMNS: &str = "p.id, p.user_id, p.text, p.img, p.created_at, p.updated_at";

/// Ids bound per statement by batch lookups. SQLite rejects more than 32766.
const ID_CHUNK: usize = 500;

/// Which posts a listing should return. Every listing is newest first.
#[derive(Debug, Clone, Copy)]
pub enum PostFilter<'a> {
    All,
    /// Posts written by this user id.
    ByAuthor(&'a str),
    /// Posts written by anyone this user id follows.
    FollowedBy(&'a str),
    /// Posts this user id has liked, most recently liked first.
    LikedBy(&'a str),
}

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
        full_name: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, full_name) VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, username, email, password_hash, full_name),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    /// Batch-fetch users for populating references. Unknown ids are skipped.
    pub fn get_users_by_ids(&self, ids: &[String]) -> Result<Vec<UserRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            query_in_chunks(
                conn,
                ids,
                |marks| format!("SELECT {} FROM users WHERE id IN ({})", USER_COLUMNS, marks),
                user_from_row,
            )
        })
    }

    /// Persist every mutable profile field of `user` and bump `updated_at`.
    pub fn update_user(&self, user: &UserRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users
                 SET username = ?2, email = ?3, password = ?4, full_name = ?5, bio = ?6,
                     link = ?7, profile_img = ?8, cover_img = ?9,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![
                    user.id,
                    user.username,
                    user.email,
                    user.password,
                    user.full_name,
                    user.bio,
                    user.link,
                    user.profile_img,
                    user.cover_img,
                ],
            )?;
            Ok(())
        })
    }

    /// Up to `size` users other than `exclude_id`, in random order.
    pub fn sample_users(&self, exclude_id: &str, size: u32) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM users WHERE id != ?1 ORDER BY RANDOM() LIMIT ?2",
                USER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![exclude_id, size], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Follows --

    /// Ids of the users following `user_id`, oldest follow first.
    pub fn get_followers(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            query_ids(
                conn,
                "SELECT follower_id FROM follows WHERE followee_id = ?1 ORDER BY created_at, rowid",
                user_id,
            )
        })
    }

    /// Ids of the users `user_id` follows, oldest follow first.
    pub fn get_following(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            query_ids(
                conn,
                "SELECT followee_id FROM follows WHERE follower_id = ?1 ORDER BY created_at, rowid",
                user_id,
            )
        })
    }

    /// Toggle a follow edge: removes it if present, inserts it if not.
    /// Returns true when `follower_id` now follows `followee_id`.
    pub fn toggle_follow(&self, follower_id: &str, followee_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
                (follower_id, followee_id),
            )?;
            if removed == 0 {
                tx.execute(
                    "INSERT INTO follows (follower_id, followee_id) VALUES (?1, ?2)",
                    (follower_id, followee_id),
                )?;
            }
            tx.commit()?;
            Ok(removed == 0)
        })
    }

    // -- Posts --

    pub fn create_post(
        &self,
        id: &str,
        user_id: &str,
        text: Option<&str>,
        img: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (id, user_id, text, img) VALUES (?1, ?2, ?3, ?4)",
                params![id, user_id, text, img],
            )?;
            Ok(())
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM posts p WHERE p.id = ?1", POST_COLUMNS);
            let row = conn.query_row(&sql, [id], post_from_row).optional()?;
            Ok(row)
        })
    }

    /// Returns false if no such post existed.
    pub fn delete_post(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            Ok(removed > 0)
        })
    }

    pub fn list_posts(&self, filter: PostFilter<'_>) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let (sql, arg) = match filter {
                PostFilter::All => (
                    format!(
                        "SELECT {} FROM posts p ORDER BY p.created_at DESC, p.rowid DESC",
                        POST_COLUMNS
                    ),
                    None,
                ),
                PostFilter::ByAuthor(user_id) => (
                    format!(
                        "SELECT {} FROM posts p WHERE p.user_id = ?1
                         ORDER BY p.created_at DESC, p.rowid DESC",
                        POST_COLUMNS
                    ),
                    Some(user_id),
                ),
                PostFilter::FollowedBy(user_id) => (
                    format!(
                        "SELECT {} FROM posts p
                         WHERE p.user_id IN (SELECT followee_id FROM follows WHERE follower_id = ?1)
                         ORDER BY p.created_at DESC, p.rowid DESC",
                        POST_COLUMNS
                    ),
                    Some(user_id),
                ),
                PostFilter::LikedBy(user_id) => (
                    format!(
                        "SELECT {} FROM posts p
                         JOIN post_likes l ON l.post_id = p.id
                         WHERE l.user_id = ?1
                         ORDER BY l.created_at DESC, l.rowid DESC",
                        POST_COLUMNS
                    ),
                    Some(user_id),
                ),
            };

            let mut stmt = conn.prepare(&sql)?;
            let rows = match arg {
                Some(user_id) => stmt.query_map([user_id], post_from_row)?,
                None => stmt.query_map([], post_from_row)?,
            }
            .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Likes --

    /// Ids of the users who liked `post_id`, in the order they liked it.
    pub fn get_likes(&self, post_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            query_ids(
                conn,
                "SELECT user_id FROM post_likes WHERE post_id = ?1 ORDER BY created_at, rowid",
                post_id,
            )
        })
    }

    /// Ids of the posts `user_id` has liked, in the order they were liked.
    pub fn get_liked_post_ids(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            query_ids(
                conn,
                "SELECT post_id FROM post_likes WHERE user_id = ?1 ORDER BY created_at, rowid",
                user_id,
            )
        })
    }

    /// Batch-fetch likes for a set of post ids.
    pub fn get_likes_for_posts(&self, post_ids: &[String]) -> Result<Vec<LikeRow>> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            query_in_chunks(
                conn,
                post_ids,
                |marks| {
                    format!(
                        "SELECT post_id, user_id FROM post_likes WHERE post_id IN ({})
                         ORDER BY created_at, rowid",
                        marks
                    )
                },
                |row| {
                    Ok(LikeRow {
                        post_id: row.get(0)?,
                        user_id: row.get(1)?,
                    })
                },
            )
        })
    }

    /// Toggle a like: removes it if present, inserts it if not, and touches
    /// the post's `updated_at`. Returns true when the post is now liked.
    pub fn toggle_like(&self, post_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
                (post_id, user_id),
            )?;
            if removed == 0 {
                tx.execute(
                    "INSERT INTO post_likes (post_id, user_id) VALUES (?1, ?2)",
                    (post_id, user_id),
                )?;
            }
            touch_post(&tx, post_id)?;
            tx.commit()?;
            Ok(removed == 0)
        })
    }

    // -- Comments --

    pub fn add_comment(&self, id: &str, post_id: &str, user_id: &str, text: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO comments (id, post_id, user_id, text) VALUES (?1, ?2, ?3, ?4)",
                (id, post_id, user_id, text),
            )?;
            touch_post(&tx, post_id)?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Batch-fetch comments for a set of post ids, oldest first.
    pub fn get_comments_for_posts(&self, post_ids: &[String]) -> Result<Vec<CommentRow>> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            query_in_chunks(
                conn,
                post_ids,
                |marks| {
                    format!(
                        "SELECT id, post_id, user_id, text, created_at FROM comments
                         WHERE post_id IN ({})
                         ORDER BY created_at, rowid",
                        marks
                    )
                },
                |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        user_id: row.get(2)?,
                        text: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
        })
    }

    // -- Notifications --

    pub fn create_notification(&self, id: &str, from_id: &str, to_id: &str, kind: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, from_id, to_id, kind) VALUES (?1, ?2, ?3, ?4)",
                (id, from_id, to_id, kind),
            )?;
            Ok(())
        })
    }

    /// Notifications addressed to `to_id`, newest first.
    pub fn list_notifications(&self, to_id: &str) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT n.id, n.from_id, u.username, u.profile_img, n.to_id, n.kind, n.read, n.created_at
                 FROM notifications n
                 JOIN users u ON u.id = n.from_id
                 WHERE n.to_id = ?1
                 ORDER BY n.created_at DESC, n.rowid DESC",
            )?;
            let rows = stmt
                .query_map([to_id], notification_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_notification(&self, id: &str) -> Result<Option<NotificationRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT n.id, n.from_id, u.username, u.profile_img, n.to_id, n.kind, n.read, n.created_at
                     FROM notifications n
                     JOIN users u ON u.id = n.from_id
                     WHERE n.id = ?1",
                    [id],
                    notification_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Mark everything addressed to `to_id` as read. Returns how many changed.
    pub fn mark_notifications_read(&self, to_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET read = 1 WHERE to_id = ?1 AND read = 0",
                [to_id],
            )?;
            Ok(changed)
        })
    }

    pub fn delete_notifications(&self, to_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM notifications WHERE to_id = ?1", [to_id])?;
            Ok(removed)
        })
    }

    pub fn delete_notification(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM notifications WHERE id = ?1", [id])?;
            Ok(removed > 0)
        })
    }
}

fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}

/// Run an `IN (...)` lookup over `ids` in slices of `ID_CHUNK`, so a listing of
/// any size stays under SQLite's bound-parameter limit. Rows from one id always
/// land in the same slice, so per-id ordering from `sql` is kept.
fn query_in_chunks<T>(
    conn: &Connection,
    ids: &[String],
    sql: impl Fn(&str) -> String,
    map: impl Fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let mut out = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(ID_CHUNK) {
        let mut stmt = conn.prepare(&sql(&placeholders(chunk.len())))?;
        let rows = stmt.query_map(params_from_iter(chunk.iter()), &map)?;
        for row in rows {
            out.push(row?);
        }
    }
    Ok(out)
}

fn touch_post(conn: &Connection, post_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE posts SET updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?1",
        [post_id],
    )
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // `column` is always one of our own literals, never user input.
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);
    let row = conn.query_row(&sql, [value], user_from_row).optional()?;
    Ok(row)
}

fn query_ids(conn: &Connection, sql: &str, arg: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map([arg], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(ids)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        full_name: row.get(4)?,
        bio: row.get(5)?,
        link: row.get(6)?,
        profile_img: row.get(7)?,
        cover_img: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        text: row.get(2)?,
        img: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        from_id: row.get(1)?,
        from_username: row.get(2)?,
        from_profile_img: row.get(3)?,
        to_id: row.get(4)?,
        kind: row.get(5)?,
        read: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
